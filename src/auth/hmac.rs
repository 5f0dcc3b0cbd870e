//! HMAC-SHA256 webhook payload verification.
//!
//! Recomputes a keyed digest over the raw request body (optionally bound to
//! a supplied timestamp) and compares it in constant time against the
//! digest the upstream sent. Fail-closed: a source with no configured
//! secret is never treated as trusted.

use std::time::Duration;

use ring::hmac;

use crate::store::now_millis;

/// Default tolerance for webhook timestamps, aligned with the recovery
/// message window. The upstream contract does not pin this value, so it is
/// configurable per verifier.
pub const DEFAULT_TIMESTAMP_TOLERANCE: Duration = Duration::from_secs(300);

/// Inputs for a single webhook verification.
#[derive(Debug, Clone, Copy)]
pub struct HmacRequest<'a> {
    /// Raw request body bytes, exactly as received.
    pub raw_body: &'a [u8],
    /// Shared secret for this source, if configured.
    pub secret: Option<&'a [u8]>,
    /// Hex digest supplied by the upstream, if any header matched.
    pub signature: Option<&'a str>,
    /// Timestamp header value (Unix seconds), if any header matched.
    pub timestamp: Option<&'a str>,
    /// Whether the digest covers `"{timestamp}.{body}"` instead of the
    /// bare body. Defends against pure signature replay.
    pub bind_timestamp: bool,
}

/// Result of one webhook verification. Produced once, never mutated.
#[derive(Debug, Clone)]
pub struct HmacOutcome {
    /// Whether the payload authenticated.
    pub valid: bool,
    /// HTTP status to return on failure (401 for all current reasons).
    pub status: u16,
    /// Stable failure reason, `None` on success.
    pub reason: Option<&'static str>,
    /// Hex digest this side computed, when a secret was available.
    pub digest: Option<String>,
}

impl HmacOutcome {
    fn ok(digest: String) -> Self {
        Self {
            valid: true,
            status: 200,
            reason: None,
            digest: Some(digest),
        }
    }

    fn rejected(reason: &'static str, digest: Option<String>) -> Self {
        Self {
            valid: false,
            status: 401,
            reason: Some(reason),
            digest,
        }
    }
}

/// Webhook payload verifier.
pub struct HmacVerifier {
    tolerance: Duration,
}

impl HmacVerifier {
    /// Create a verifier with the given timestamp tolerance.
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    /// Verify one webhook request. Never errors.
    pub fn verify(&self, request: &HmacRequest<'_>) -> HmacOutcome {
        self.verify_at(request, (now_millis() / 1000) as i64)
    }

    fn verify_at(&self, request: &HmacRequest<'_>, now_secs: i64) -> HmacOutcome {
        let secret = match request.secret {
            Some(secret) if !secret.is_empty() => secret,
            _ => return HmacOutcome::rejected("not_configured", None),
        };

        let supplied = match request.signature {
            Some(sig) if !sig.is_empty() => sig,
            _ => return HmacOutcome::rejected("missing_signature", None),
        };

        // Timestamp freshness is checked before the digest so an attacker
        // replaying an old but correctly signed payload learns nothing new.
        if let Some(ts) = request.timestamp {
            match ts.trim().parse::<i64>() {
                Ok(ts) if (now_secs - ts).unsigned_abs() <= self.tolerance.as_secs() => {}
                _ => return HmacOutcome::rejected("timestamp_out_of_range", None),
            }
        } else if request.bind_timestamp {
            // A timestamp-bound source cannot be verified without one.
            return HmacOutcome::rejected("timestamp_out_of_range", None);
        }

        let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
        let message: Vec<u8> = if request.bind_timestamp {
            // bind_timestamp without a timestamp returned above.
            let ts = request.timestamp.unwrap_or_default().trim();
            let mut message = Vec::with_capacity(ts.len() + 1 + request.raw_body.len());
            message.extend_from_slice(ts.as_bytes());
            message.push(b'.');
            message.extend_from_slice(request.raw_body);
            message
        } else {
            request.raw_body.to_vec()
        };
        let digest = hex::encode(hmac::sign(&key, &message).as_ref());

        let supplied_bytes = match hex::decode(strip_prefix(supplied)) {
            Ok(bytes) => bytes,
            Err(_) => return HmacOutcome::rejected("invalid_signature", Some(digest)),
        };

        // Constant-time tag comparison; a wrong-length tag also fails.
        if hmac::verify(&key, &message, &supplied_bytes).is_err() {
            return HmacOutcome::rejected("invalid_signature", Some(digest));
        }

        HmacOutcome::ok(digest)
    }
}

impl Default for HmacVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_TOLERANCE)
    }
}

/// Strip a `sha256=` scheme prefix some upstreams put on the digest.
fn strip_prefix(signature: &str) -> &str {
    signature
        .strip_prefix("sha256=")
        .unwrap_or(signature)
        .trim()
}

/// Compute the hex HMAC-SHA256 digest of a body (for callers that sign).
pub fn digest_hex(secret: &[u8], body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    hex::encode(hmac::sign(&key, body).as_ref())
}

/// Timestamp-bound variant of [`digest_hex`] over `"{timestamp}.{body}"`.
pub fn digest_hex_bound(secret: &[u8], timestamp: &str, body: &[u8]) -> String {
    let mut message = Vec::with_capacity(timestamp.len() + 1 + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(body);
    digest_hex(secret, &message)
}
