//! Request gate orchestration.
//!
//! [`RequestGate`] composes the verifiers and stateful trackers into a
//! single accept/reject decision per inbound request. It is not a
//! long-lived state machine: each call runs a fixed pipeline (content type,
//! body parse, class-specific verification, rate limit) and emits one
//! audit record before the verdict returns. No error escapes the gate;
//! every failure path becomes a typed verdict.

mod request;
mod verdict;

pub use request::{RecoveryRequest, RequestMeta, RECOVERY_REQUIRED_FIELDS};
pub use verdict::GateVerdict;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{sanitize_detail, AuditEntry, AuditLogger};
use crate::auth::headers::{client_identifier, first_header};
use crate::auth::{
    signature, AuthContext, BearerVerifier, HmacRequest, HmacVerifier, NonceStore,
    RateLimitConfig, RateLimitDecision, RateLimiter,
};
use crate::config::Settings;
use crate::error::{AuthErrorKind, GateError, GateResult, ValidationErrorKind};
use crate::store::{now_millis, KeyValueStore};

/// Downstream collaborator that receives verified webhook payloads.
///
/// Delivery is fire-and-forget: failures are logged and never flip a
/// verified webhook back to rejected.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn deliver(&self, source: &str, payload: &serde_json::Value) -> GateResult<()>;
}

/// One configured webhook source with resolved secret and header table.
struct WebhookSource {
    secret: Option<Vec<u8>>,
    signature_headers: Vec<String>,
    timestamp_headers: Vec<String>,
    bind_timestamp: bool,
    rate: RateLimitConfig,
}

/// The request-integrity gate.
pub struct RequestGate {
    nonces: Arc<NonceStore>,
    limiter: Arc<RateLimiter>,
    hmac: HmacVerifier,
    bearer: BearerVerifier,
    webhooks: HashMap<String, WebhookSource>,
    recovery_rate: RateLimitConfig,
    timestamp_tolerance: Duration,
    future_skew: Duration,
    nonce_ttl: Duration,
    audit: Option<Arc<AuditLogger>>,
    sink: Option<Arc<dyn WebhookSink>>,
}

impl RequestGate {
    /// Build a gate from settings over the given key-value store.
    ///
    /// Webhook secrets are resolved here; a source whose secret cannot be
    /// resolved stays in the table unconfigured and rejects every request
    /// (fail-closed) until the daemon restarts with the secret present.
    pub fn new(
        settings: &Settings,
        store: Arc<dyn KeyValueStore>,
        audit: Option<Arc<AuditLogger>>,
    ) -> Self {
        let security = &settings.security;

        let webhooks = settings
            .webhooks
            .iter()
            .map(|cfg| {
                let secret = cfg.resolve_secret();
                if secret.is_none() {
                    warn!(
                        source = %cfg.name,
                        "Webhook source has no shared secret; all its requests will be rejected"
                    );
                }
                (
                    cfg.name.clone(),
                    WebhookSource {
                        secret,
                        signature_headers: cfg.signature_headers.clone(),
                        timestamp_headers: cfg.timestamp_headers.clone(),
                        bind_timestamp: cfg.bind_timestamp,
                        rate: cfg.rate_limit(),
                    },
                )
            })
            .collect();

        let nonce_ttl = Duration::from_secs(security.nonce_ttl_seconds);
        let nonces = Arc::new(NonceStore::new(Arc::clone(&store), nonce_ttl));
        let limiter = Arc::new(RateLimiter::new(store));

        Self {
            nonces,
            limiter,
            hmac: HmacVerifier::new(Duration::from_secs(security.timestamp_tolerance_seconds)),
            bearer: BearerVerifier::new(
                Duration::from_secs(security.bearer_ttl_seconds),
                security.admin_addresses.clone(),
            ),
            webhooks,
            recovery_rate: RateLimitConfig::preset(&security.recovery_rate_preset)
                .unwrap_or(RateLimitConfig::AUTH),
            timestamp_tolerance: Duration::from_secs(security.timestamp_tolerance_seconds),
            future_skew: Duration::from_secs(security.future_skew_seconds),
            nonce_ttl,
            audit,
            sink: None,
        }
    }

    /// Attach a downstream webhook sink.
    pub fn with_sink(mut self, sink: Arc<dyn WebhookSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Shared nonce store (for sweep-task startup).
    pub fn nonces(&self) -> Arc<NonceStore> {
        Arc::clone(&self.nonces)
    }

    /// Shared rate limiter (for sweep-task startup).
    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Derive the auth context for a request (frame APIs and identifier
    /// resolution). Never rejects by itself.
    pub fn auth_context(&self, meta: &RequestMeta) -> AuthContext {
        self.bearer.context(meta.bearer.as_deref())
    }

    /// Evaluate a webhook-class request against the named source.
    pub fn evaluate_webhook(&self, source_name: &str, meta: &RequestMeta) -> GateVerdict {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let auth = self.auth_context(meta);
        let identifier = client_identifier(&meta.headers, &auth);

        let mut rate = None;
        let result = self.webhook_pipeline(source_name, meta, &identifier, &mut rate);
        let verdict = self.conclude(request_id, result, rate, &identifier);

        self.emit_audit(
            request_id,
            format!("webhook.{}", source_name),
            &identifier,
            meta,
            &verdict,
            started,
        );
        verdict
    }

    fn webhook_pipeline(
        &self,
        source_name: &str,
        meta: &RequestMeta,
        identifier: &str,
        rate: &mut Option<RateLimitDecision>,
    ) -> GateResult<serde_json::Value> {
        if !meta.is_json() {
            return Err(GateError::UnsupportedContentType {
                supplied: meta.content_type.clone(),
            });
        }

        // The raw bytes stay authoritative for HMAC; the parsed value is
        // only used for forwarding once the payload authenticates.
        let payload: serde_json::Value =
            serde_json::from_slice(&meta.body).map_err(|e| GateError::Validation {
                kind: ValidationErrorKind::MalformedJson {
                    message: e.to_string(),
                },
            })?;

        let source = self
            .webhooks
            .get(source_name)
            .ok_or_else(|| GateError::Validation {
                kind: ValidationErrorKind::UnknownSource {
                    name: source_name.to_string(),
                },
            })?;

        let outcome = self.hmac.verify(&HmacRequest {
            raw_body: &meta.body,
            secret: source.secret.as_deref(),
            signature: first_header(&meta.headers, &source.signature_headers),
            timestamp: first_header(&meta.headers, &source.timestamp_headers),
            bind_timestamp: source.bind_timestamp,
        });
        if !outcome.valid {
            let kind = match outcome.reason {
                Some("not_configured") => AuthErrorKind::NotConfigured,
                Some("missing_signature") => AuthErrorKind::MissingSignature,
                Some("timestamp_out_of_range") => AuthErrorKind::TimestampOutOfRange,
                _ => AuthErrorKind::DigestMismatch,
            };
            return Err(GateError::Auth { kind });
        }

        let decision = self.limiter.check(identifier, source.rate);
        *rate = Some(decision);
        if !decision.allowed {
            return Err(GateError::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(1),
            });
        }

        self.forward(source_name, payload);
        Ok(json!({ "success": true }))
    }

    /// Evaluate a recovery-class request.
    pub fn evaluate_recovery(&self, meta: &RequestMeta) -> GateVerdict {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let auth = self.auth_context(meta);
        let identifier = client_identifier(&meta.headers, &auth);

        let mut rate = None;
        let result = self.recovery_pipeline(meta, &identifier, &mut rate);
        let verdict = self.conclude(request_id, result, rate, &identifier);

        self.emit_audit(
            request_id,
            "recovery.validate".to_string(),
            &identifier,
            meta,
            &verdict,
            started,
        );
        verdict
    }

    fn recovery_pipeline(
        &self,
        meta: &RequestMeta,
        identifier: &str,
        rate: &mut Option<RateLimitDecision>,
    ) -> GateResult<serde_json::Value> {
        if !meta.is_json() {
            return Err(GateError::UnsupportedContentType {
                supplied: meta.content_type.clone(),
            });
        }

        let value: serde_json::Value =
            serde_json::from_slice(&meta.body).map_err(|e| GateError::Validation {
                kind: ValidationErrorKind::MalformedJson {
                    message: e.to_string(),
                },
            })?;

        for field in RECOVERY_REQUIRED_FIELDS {
            if value.get(field).map(|v| v.is_null()).unwrap_or(true) {
                return Err(GateError::Validation {
                    kind: ValidationErrorKind::MissingField {
                        field: field.to_string(),
                    },
                });
            }
        }

        let request: RecoveryRequest =
            serde_json::from_value(value).map_err(|e| GateError::Validation {
                kind: ValidationErrorKind::MalformedJson {
                    message: e.to_string(),
                },
            })?;

        if request.addresses.is_empty() {
            return Err(GateError::Validation {
                kind: ValidationErrorKind::MissingField {
                    field: "addresses".to_string(),
                },
            });
        }

        // Cheap replay pre-check before any signature work. Consumption is
        // only committed after the whole request validates.
        if self.nonces.is_spent(&request.nonce) {
            return Err(GateError::Auth {
                kind: AuthErrorKind::NonceReused,
            });
        }

        let now_ms = now_millis();
        let age_ms = now_ms as i64 - request.timestamp as i64;
        if age_ms > self.timestamp_tolerance.as_millis() as i64
            || -age_ms > self.future_skew.as_millis() as i64
        {
            return Err(GateError::Auth {
                kind: AuthErrorKind::SignatureExpired {
                    age_seconds: age_ms / 1000,
                },
            });
        }

        // The signed text is a contract: rebuild it and compare
        // byte-for-byte before looking at the signature.
        if request.message != request.expected_message() {
            return Err(GateError::Validation {
                kind: ValidationErrorKind::MessageMismatch,
            });
        }

        let recovered = signature::verify_any(
            request.addresses.iter().map(String::as_str),
            &request.message,
            &request.signature,
        )
        .ok_or(GateError::Auth {
            kind: AuthErrorKind::InvalidSignature,
        })?;

        // Commit: the nonce is durably consumed only now. A concurrent
        // request that validated the same nonce loses this insert.
        if !self.nonces.try_consume(&request.nonce) {
            return Err(GateError::Auth {
                kind: AuthErrorKind::NonceReused,
            });
        }

        let decision = self.limiter.check(identifier, self.recovery_rate);
        *rate = Some(decision);
        if !decision.allowed {
            return Err(GateError::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(1),
            });
        }

        Ok(json!({
            "valid": true,
            "farcasterUsername": request.farcaster_username,
            "fid": request.fid,
            "recoveredAddress": recovered,
            "timestamp": request.timestamp,
        }))
    }

    /// Issue a fresh recovery nonce for a client to embed in its message.
    pub fn issue_nonce(&self, meta: &RequestMeta) -> GateVerdict {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let auth = self.auth_context(meta);
        let identifier = client_identifier(&meta.headers, &auth);

        let decision = self.limiter.check(&identifier, RateLimitConfig::STANDARD);
        let result = if decision.allowed {
            Ok(json!({
                "nonce": self.nonces.issue(),
                "expiresInSeconds": self.nonce_ttl.as_secs(),
            }))
        } else {
            Err(GateError::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(1),
            })
        };
        let verdict = self.conclude(request_id, result, Some(decision), &identifier);

        self.emit_audit(
            request_id,
            "recovery.nonce".to_string(),
            &identifier,
            meta,
            &verdict,
            started,
        );
        verdict
    }

    fn conclude(
        &self,
        request_id: Uuid,
        result: GateResult<serde_json::Value>,
        rate: Option<RateLimitDecision>,
        identifier: &str,
    ) -> GateVerdict {
        match result {
            Ok(body) => {
                info!(request_id = %request_id, identifier = %identifier, "Request allowed");
                GateVerdict::allow(body, rate)
            }
            Err(e) => {
                warn!(
                    request_id = %request_id,
                    identifier = %identifier,
                    reason = e.reason(),
                    error = %e,
                    "Request rejected"
                );
                GateVerdict::reject(&e, rate)
            }
        }
    }

    /// Hand a verified payload to the sink without blocking the verdict.
    fn forward(&self, source_name: &str, payload: serde_json::Value) {
        let sink = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => return,
        };
        let source = source_name.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.deliver(&source, &payload).await {
                        error!(source = %source, error = %e, "Webhook forwarding failed");
                    }
                });
            }
            Err(_) => {
                warn!(source = %source_name, "No async runtime; webhook forwarding skipped");
            }
        }
    }

    fn emit_audit(
        &self,
        request_id: Uuid,
        endpoint: String,
        identifier: &str,
        meta: &RequestMeta,
        verdict: &GateVerdict,
        started: Instant,
    ) {
        let logger = match &self.audit {
            Some(logger) => logger,
            None => return,
        };

        let detail = sanitize_detail(&json!({
            "content_type": meta.content_type,
            "body_bytes": meta.body.len(),
            "headers": meta.headers,
        }));
        let duration_ms = started.elapsed().as_millis() as u64;

        let entry = match verdict.reason {
            None => AuditEntry::allowed(
                Utc::now().to_rfc3339(),
                request_id,
                endpoint,
                identifier.to_string(),
                detail,
                verdict.status,
                duration_ms,
            ),
            Some(reason) => AuditEntry::rejected(
                Utc::now().to_rfc3339(),
                request_id,
                endpoint,
                identifier.to_string(),
                detail,
                verdict.status,
                reason.to_string(),
                duration_ms,
            ),
        };

        if let Err(e) = logger.log(&entry) {
            error!(error = %e, "Failed to write audit log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hmac::{digest_hex, digest_hex_bound};
    use crate::auth::signature::testutil::{sign_message, test_key};
    use crate::config::Settings;
    use crate::store::MemoryStore;

    const SECRET: &str = "test-webhook-secret";

    fn settings() -> Settings {
        toml::from_str(&format!(
            r#"
            [[webhook]]
            name = "payments"
            secret = "{SECRET}"

            [[webhook]]
            name = "pinning"
            secret = "{SECRET}"
            signature_headers = ["x-pinning-signature"]
            timestamp_headers = ["x-pinning-timestamp"]
            bind_timestamp = true

            [[webhook]]
            name = "ghost"
            "#
        ))
        .unwrap()
    }

    fn gate() -> RequestGate {
        RequestGate::new(&settings(), Arc::new(MemoryStore::new()), None)
    }

    fn webhook_meta(body: &[u8], secret: &str) -> RequestMeta {
        let digest = digest_hex(secret.as_bytes(), body);
        RequestMeta::new(body.to_vec()).with_header("x-webhook-signature", &digest)
    }

    #[test]
    fn test_webhook_accepted() {
        let gate = gate();
        let body = br#"{"event":"payment.settled"}"#;

        let verdict = gate.evaluate_webhook("payments", &webhook_meta(body, SECRET));
        assert!(verdict.is_allowed());
        assert_eq!(verdict.status, 200);
        assert_eq!(verdict.body, json!({"success": true}));
        assert!(verdict.rate.is_some());
    }

    #[test]
    fn test_webhook_without_signature_rejected() {
        let gate = gate();
        let meta = RequestMeta::new(br#"{"event":"x"}"#.to_vec());

        let verdict = gate.evaluate_webhook("payments", &meta);
        assert_eq!(verdict.status, 401);
        assert_eq!(verdict.reason, Some("missing_signature"));
        // The limiter is never consulted on signature failure.
        assert!(verdict.rate.is_none());
    }

    #[test]
    fn test_webhook_wrong_secret_rejected() {
        let gate = gate();
        let body = br#"{"event":"x"}"#;

        let verdict = gate.evaluate_webhook("payments", &webhook_meta(body, "other-secret"));
        assert_eq!(verdict.status, 401);
        assert_eq!(verdict.reason, Some("invalid_signature"));
    }

    #[test]
    fn test_webhook_wrong_content_type() {
        let gate = gate();
        let meta = webhook_meta(b"{}", SECRET).with_content_type(Some("text/plain"));

        let verdict = gate.evaluate_webhook("payments", &meta);
        assert_eq!(verdict.status, 415);
    }

    #[test]
    fn test_webhook_malformed_json() {
        let gate = gate();
        let body = b"{not json";
        let verdict = gate.evaluate_webhook("payments", &webhook_meta(body, SECRET));
        assert_eq!(verdict.status, 400);
        assert_eq!(verdict.reason, Some("malformed_json"));
    }

    #[test]
    fn test_webhook_unknown_source() {
        let gate = gate();
        let verdict = gate.evaluate_webhook("mystery", &webhook_meta(b"{}", SECRET));
        assert_eq!(verdict.status, 404);
    }

    #[test]
    fn test_webhook_unconfigured_source_fails_closed() {
        let gate = gate();
        let verdict = gate.evaluate_webhook("ghost", &webhook_meta(b"{}", SECRET));
        assert_eq!(verdict.status, 401);
        assert_eq!(verdict.reason, Some("not_configured"));
    }

    #[test]
    fn test_webhook_timestamp_bound_source() {
        let gate = gate();
        let body = br#"{"cid":"bafy..."}"#;
        let ts = ((now_millis() / 1000) as i64 - 10).to_string();
        let digest = digest_hex_bound(SECRET.as_bytes(), &ts, body);

        let meta = RequestMeta::new(body.to_vec())
            .with_header("x-pinning-signature", &digest)
            .with_header("x-pinning-timestamp", &ts);
        assert!(gate.evaluate_webhook("pinning", &meta).is_allowed());

        // Same digest with a stale timestamp is rejected.
        let stale = ((now_millis() / 1000) as i64 - 900).to_string();
        let digest = digest_hex_bound(SECRET.as_bytes(), &stale, body);
        let meta = RequestMeta::new(body.to_vec())
            .with_header("x-pinning-signature", &digest)
            .with_header("x-pinning-timestamp", &stale);
        let verdict = gate.evaluate_webhook("pinning", &meta);
        assert_eq!(verdict.status, 401);
        assert_eq!(verdict.reason, Some("timestamp_out_of_range"));
    }

    fn recovery_body(gate: &RequestGate) -> (Vec<u8>, String) {
        let (key, address) = test_key();
        let nonce = gate.nonces().issue();
        let timestamp = now_millis();

        let mut request = RecoveryRequest {
            farcaster_username: "alice".to_string(),
            fid: 1234,
            addresses: vec![
                "0x0000000000000000000000000000000000000001".to_string(),
                address.clone(),
            ],
            signature: String::new(),
            message: String::new(),
            nonce,
            timestamp,
        };
        request.message = request.expected_message();
        request.signature = sign_message(&key, &request.message);
        (serde_json::to_vec(&request).unwrap(), address)
    }

    #[test]
    fn test_recovery_accepted() {
        let gate = gate();
        let (body, address) = recovery_body(&gate);

        let verdict = gate.evaluate_recovery(&RequestMeta::new(body));
        assert!(verdict.is_allowed(), "verdict: {:?}", verdict.body);
        assert_eq!(verdict.body["valid"], true);
        assert_eq!(verdict.body["farcasterUsername"], "alice");
        assert_eq!(verdict.body["fid"], 1234);
        assert_eq!(verdict.body["recoveredAddress"], address);
    }

    #[test]
    fn test_recovery_nonce_reuse_rejected() {
        let gate = gate();
        let (body, _) = recovery_body(&gate);

        assert!(gate.evaluate_recovery(&RequestMeta::new(body.clone())).is_allowed());

        let verdict = gate.evaluate_recovery(&RequestMeta::new(body));
        assert_eq!(verdict.status, 400);
        assert_eq!(verdict.reason, Some("nonce_already_used"));
        assert_eq!(verdict.body, json!({"error": "Nonce already used"}));
    }

    #[test]
    fn test_recovery_expired_timestamp() {
        let gate = gate();
        let (key, address) = test_key();

        let mut request = RecoveryRequest {
            farcaster_username: "alice".to_string(),
            fid: 1,
            addresses: vec![address],
            signature: String::new(),
            message: String::new(),
            nonce: gate.nonces().issue(),
            timestamp: now_millis() - 600_000, // 10 minutes old
        };
        request.message = request.expected_message();
        request.signature = sign_message(&key, &request.message);

        let verdict =
            gate.evaluate_recovery(&RequestMeta::new(serde_json::to_vec(&request).unwrap()));
        assert_eq!(verdict.status, 400);
        assert_eq!(verdict.reason, Some("signature_expired"));
    }

    #[test]
    fn test_recovery_message_mismatch() {
        let gate = gate();
        let (key, address) = test_key();

        let mut request = RecoveryRequest {
            farcaster_username: "alice".to_string(),
            fid: 1,
            addresses: vec![address],
            signature: String::new(),
            message: "a message of my own devising".to_string(),
            nonce: gate.nonces().issue(),
            timestamp: now_millis(),
        };
        // Valid signature over the wrong text still fails the contract.
        request.signature = sign_message(&key, &request.message);

        let verdict =
            gate.evaluate_recovery(&RequestMeta::new(serde_json::to_vec(&request).unwrap()));
        assert_eq!(verdict.status, 400);
        assert_eq!(verdict.reason, Some("invalid_message_format"));
    }

    #[test]
    fn test_recovery_no_candidate_matches() {
        let gate = gate();
        let (key, _) = test_key();

        let mut request = RecoveryRequest {
            farcaster_username: "alice".to_string(),
            fid: 1,
            addresses: vec!["0x0000000000000000000000000000000000000001".to_string()],
            signature: String::new(),
            message: String::new(),
            nonce: gate.nonces().issue(),
            timestamp: now_millis(),
        };
        request.message = request.expected_message();
        request.signature = sign_message(&key, &request.message);

        let verdict =
            gate.evaluate_recovery(&RequestMeta::new(serde_json::to_vec(&request).unwrap()));
        assert_eq!(verdict.status, 400);
        assert_eq!(verdict.reason, Some("invalid_signature"));
    }

    #[test]
    fn test_recovery_missing_field() {
        let gate = gate();
        let body = br#"{"farcasterUsername":"alice","fid":1}"#;

        let verdict = gate.evaluate_recovery(&RequestMeta::new(body.to_vec()));
        assert_eq!(verdict.status, 400);
        assert_eq!(verdict.reason, Some("missing_field"));
    }

    #[test]
    fn test_recovery_failed_validation_leaves_nonce_fresh() {
        let gate = gate();
        let (key, address) = test_key();
        let nonce = gate.nonces().issue();

        // First attempt fails signature validation against the candidates.
        let mut request = RecoveryRequest {
            farcaster_username: "alice".to_string(),
            fid: 1,
            addresses: vec!["0x0000000000000000000000000000000000000001".to_string()],
            signature: String::new(),
            message: String::new(),
            nonce: nonce.clone(),
            timestamp: now_millis(),
        };
        request.message = request.expected_message();
        request.signature = sign_message(&key, &request.message);
        let verdict =
            gate.evaluate_recovery(&RequestMeta::new(serde_json::to_vec(&request).unwrap()));
        assert_eq!(verdict.reason, Some("invalid_signature"));

        // The nonce was never committed; a corrected attempt may reuse it.
        request.addresses = vec![address];
        request.message = request.expected_message();
        request.signature = sign_message(&key, &request.message);
        let verdict =
            gate.evaluate_recovery(&RequestMeta::new(serde_json::to_vec(&request).unwrap()));
        assert!(verdict.is_allowed());
    }

    #[test]
    fn test_webhook_rate_limit_exhaustion() {
        // The recovery preset (auth: 5 / 15 min) also guards this webhook
        // source in a dedicated settings table.
        let settings: Settings = toml::from_str(&format!(
            r#"
            [[webhook]]
            name = "payments"
            secret = "{SECRET}"
            rate_preset = "auth"
            "#
        ))
        .unwrap();
        let gate = RequestGate::new(&settings, Arc::new(MemoryStore::new()), None);

        let body = br#"{"event":"x"}"#;
        let meta = webhook_meta(body, SECRET).with_header("x-forwarded-for", "203.0.113.7");

        for _ in 0..5 {
            assert!(gate.evaluate_webhook("payments", &meta).is_allowed());
        }

        let verdict = gate.evaluate_webhook("payments", &meta);
        assert_eq!(verdict.status, 429);
        assert!(verdict.retry_after_secs.unwrap() > 0);

        // A different caller is unaffected.
        let other = webhook_meta(body, SECRET).with_header("x-forwarded-for", "198.51.100.2");
        assert!(gate.evaluate_webhook("payments", &other).is_allowed());
    }

    #[test]
    fn test_issue_nonce() {
        let gate = gate();
        let verdict = gate.issue_nonce(&RequestMeta::new(Vec::new()));
        assert!(verdict.is_allowed());
        let nonce = verdict.body["nonce"].as_str().unwrap();
        assert_eq!(nonce.len(), 64);
        assert_eq!(verdict.body["expiresInSeconds"], 300);
    }
}
