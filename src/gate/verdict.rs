//! Gate verdict types.

use serde_json::json;

use crate::auth::RateLimitDecision;
use crate::error::GateError;

/// The gate's decision for one inbound request.
///
/// Produced once per attempt and never mutated; the HTTP layer translates
/// it mechanically into a response (status, JSON body, rate-limit headers).
#[derive(Debug, Clone)]
pub struct GateVerdict {
    /// HTTP status to return.
    pub status: u16,
    /// Response body.
    pub body: serde_json::Value,
    /// Rate-limit window state, when the pipeline reached the limiter.
    pub rate: Option<RateLimitDecision>,
    /// Seconds for the `Retry-After` header on 429.
    pub retry_after_secs: Option<u64>,
    /// Rejection reason code, `None` when allowed.
    pub reason: Option<&'static str>,
}

impl GateVerdict {
    /// An accepting verdict with the given response body.
    pub fn allow(body: serde_json::Value, rate: Option<RateLimitDecision>) -> Self {
        Self {
            status: 200,
            body,
            rate,
            retry_after_secs: None,
            reason: None,
        }
    }

    /// A rejecting verdict derived from a typed error.
    ///
    /// The body carries only the client-safe message; the detailed error
    /// stays server-side.
    pub fn reject(error: &GateError, rate: Option<RateLimitDecision>) -> Self {
        let retry_after_secs = match error {
            GateError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        Self {
            status: error.status(),
            body: json!({ "error": error.client_message() }),
            rate,
            retry_after_secs,
            reason: Some(error.reason()),
        }
    }

    /// Whether the request was accepted.
    pub fn is_allowed(&self) -> bool {
        self.reason.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthErrorKind;

    #[test]
    fn test_allow_verdict() {
        let verdict = GateVerdict::allow(json!({"success": true}), None);
        assert!(verdict.is_allowed());
        assert_eq!(verdict.status, 200);
        assert_eq!(verdict.body["success"], true);
    }

    #[test]
    fn test_reject_verdict_carries_retry_after() {
        let verdict = GateVerdict::reject(
            &GateError::RateLimited {
                retry_after_secs: 42,
            },
            None,
        );
        assert!(!verdict.is_allowed());
        assert_eq!(verdict.status, 429);
        assert_eq!(verdict.retry_after_secs, Some(42));
        assert_eq!(verdict.reason, Some("rate_limited"));
    }

    #[test]
    fn test_reject_body_is_sanitized() {
        let verdict = GateVerdict::reject(
            &GateError::Auth {
                kind: AuthErrorKind::NonceReused,
            },
            None,
        );
        assert_eq!(verdict.body, json!({"error": "Nonce already used"}));
    }
}
