//! Bearer token parsing and per-request auth context.
//!
//! Tokens have the form `"<address>:<signature>:<message>:<timestampMillis>"`
//! and are valid for a bounded lifetime from issuance. The context is
//! reconstructed from the token on every call; nothing is persisted.

use std::time::Duration;

use tracing::debug;

use crate::store::now_millis;

use super::signature;

/// Default bearer token lifetime: 5 minutes from issuance.
pub const DEFAULT_BEARER_TTL: Duration = Duration::from_secs(300);

/// Tolerated clock skew for tokens stamped slightly in the future.
const FUTURE_SKEW_MS: u64 = 60_000;

/// Identity derived from a bearer token for one request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Verified signer address, lowercase hex, when authenticated.
    pub address: Option<String>,
    /// Whether the token verified.
    pub is_authenticated: bool,
    /// Whether the verified address is a configured admin.
    pub is_admin: bool,
}

impl AuthContext {
    /// Context for a request with no usable token.
    pub fn anonymous() -> Self {
        Self {
            address: None,
            is_authenticated: false,
            is_admin: false,
        }
    }
}

/// Verifier for bearer tokens.
pub struct BearerVerifier {
    ttl: Duration,
    admin_addresses: Vec<String>,
}

impl BearerVerifier {
    /// Create a verifier with the given token lifetime and admin list.
    pub fn new(ttl: Duration, admin_addresses: Vec<String>) -> Self {
        let admin_addresses = admin_addresses
            .into_iter()
            .map(|a| a.to_ascii_lowercase())
            .collect();
        Self {
            ttl,
            admin_addresses,
        }
    }

    /// Derive the auth context for a request.
    ///
    /// Any defect (malformed token, expired timestamp, signature mismatch)
    /// yields the anonymous context; bearer auth never rejects a request by
    /// itself, it only withholds the authenticated identity.
    pub fn context(&self, token: Option<&str>) -> AuthContext {
        self.context_at(token, now_millis())
    }

    fn context_at(&self, token: Option<&str>, now_ms: u64) -> AuthContext {
        let token = match token {
            Some(token) => token,
            None => return AuthContext::anonymous(),
        };

        let parsed = match parse_token(token) {
            Some(parsed) => parsed,
            None => {
                debug!("Malformed bearer token");
                return AuthContext::anonymous();
            }
        };

        // Expiry first: a stale token is rejected before signature work.
        let age = now_ms.saturating_sub(parsed.timestamp_ms);
        if age > self.ttl.as_millis() as u64
            || parsed.timestamp_ms > now_ms + FUTURE_SKEW_MS
        {
            debug!(age_ms = age, "Bearer token outside validity window");
            return AuthContext::anonymous();
        }

        if !signature::verify(parsed.address, parsed.message, parsed.signature) {
            debug!("Bearer token signature mismatch");
            return AuthContext::anonymous();
        }

        let address = parsed.address.to_ascii_lowercase();
        let is_admin = self.admin_addresses.iter().any(|a| *a == address);
        AuthContext {
            address: Some(address),
            is_authenticated: true,
            is_admin,
        }
    }
}

struct ParsedToken<'a> {
    address: &'a str,
    signature: &'a str,
    message: &'a str,
    timestamp_ms: u64,
}

/// Split a token into its four parts.
///
/// The message may itself contain colons, so the address and signature are
/// taken from the front and the timestamp from the back; whatever remains
/// in the middle is the message.
fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
    let (address, rest) = token.split_once(':')?;
    let (signature, rest) = rest.split_once(':')?;
    let (message, timestamp) = rest.rsplit_once(':')?;

    if address.is_empty() || signature.is_empty() || message.is_empty() {
        return None;
    }

    Some(ParsedToken {
        address,
        signature,
        message,
        timestamp_ms: timestamp.parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signature::testutil::{sign_message, test_key};

    fn token_for(message: &str, timestamp_ms: u64) -> (String, String) {
        let (key, address) = test_key();
        let signature = sign_message(&key, message);
        (
            format!("{}:{}:{}:{}", address, signature, message, timestamp_ms),
            address,
        )
    }

    #[test]
    fn test_valid_token_authenticates() {
        let now = 1_700_000_000_000u64;
        let (token, address) = token_for("session for app", now - 1_000);

        let verifier = BearerVerifier::new(DEFAULT_BEARER_TTL, Vec::new());
        let ctx = verifier.context_at(Some(&token), now);

        assert!(ctx.is_authenticated);
        assert_eq!(ctx.address.as_deref(), Some(address.as_str()));
        assert!(!ctx.is_admin);
    }

    #[test]
    fn test_message_with_colons_survives_parsing() {
        let now = 1_700_000_000_000u64;
        let (token, _) = token_for("sign-in: app:v2 at 12:30", now);

        let verifier = BearerVerifier::new(DEFAULT_BEARER_TTL, Vec::new());
        assert!(verifier.context_at(Some(&token), now).is_authenticated);
    }

    #[test]
    fn test_expired_token_is_anonymous() {
        let now = 1_700_000_000_000u64;
        let (token, _) = token_for("old session", now - 301_000);

        let verifier = BearerVerifier::new(DEFAULT_BEARER_TTL, Vec::new());
        let ctx = verifier.context_at(Some(&token), now);
        assert!(!ctx.is_authenticated);
        assert!(ctx.address.is_none());
    }

    #[test]
    fn test_forged_signature_is_anonymous() {
        let now = 1_700_000_000_000u64;
        let (key, _) = test_key();
        let signature = sign_message(&key, "legit message");
        // Claim a different address than the one that signed.
        let token = format!(
            "0x0000000000000000000000000000000000000001:{}:legit message:{}",
            signature, now
        );

        let verifier = BearerVerifier::new(DEFAULT_BEARER_TTL, Vec::new());
        assert!(!verifier.context_at(Some(&token), now).is_authenticated);
    }

    #[test]
    fn test_admin_flag() {
        let now = 1_700_000_000_000u64;
        let (token, address) = token_for("admin session", now);

        let verifier = BearerVerifier::new(
            DEFAULT_BEARER_TTL,
            vec![address.to_uppercase()],
        );
        let ctx = verifier.context_at(Some(&token), now);
        assert!(ctx.is_authenticated);
        assert!(ctx.is_admin);
    }

    #[test]
    fn test_malformed_tokens_are_anonymous() {
        let verifier = BearerVerifier::new(DEFAULT_BEARER_TTL, Vec::new());
        for token in [
            "",
            "no-separators",
            "a:b",
            "a:b:c:not-a-number",
            ":sig:msg:123",
        ] {
            let ctx = verifier.context_at(Some(token), 1_000_000);
            assert!(!ctx.is_authenticated, "token {:?} must not authenticate", token);
        }
        assert!(!verifier.context_at(None, 0).is_authenticated);
    }
}
