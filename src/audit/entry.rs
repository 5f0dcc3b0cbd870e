//! Audit entry types.

use serde::Serialize;
use uuid::Uuid;

/// A single audit log entry for one gated request.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// ISO 8601 timestamp of the attempt.
    pub timestamp: String,
    /// Unique identifier for the request.
    pub request_id: Uuid,
    /// Endpoint class, e.g. `webhook.payments` or `recovery.validate`.
    pub endpoint: String,
    /// Rate-limit identifier the request resolved to.
    pub identifier: String,
    /// Sanitized request detail (sensitive values redacted).
    pub detail: serde_json::Value,
    /// Verdict for this attempt.
    pub outcome: AuditOutcome,
    /// Processing duration in milliseconds.
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Entry for an accepted request.
    #[allow(clippy::too_many_arguments)]
    pub fn allowed(
        timestamp: String,
        request_id: Uuid,
        endpoint: String,
        identifier: String,
        detail: serde_json::Value,
        status: u16,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp,
            request_id,
            endpoint,
            identifier,
            detail,
            outcome: AuditOutcome::Allowed { status },
            duration_ms,
        }
    }

    /// Entry for a rejected request.
    #[allow(clippy::too_many_arguments)]
    pub fn rejected(
        timestamp: String,
        request_id: Uuid,
        endpoint: String,
        identifier: String,
        detail: serde_json::Value,
        status: u16,
        reason: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp,
            request_id,
            endpoint,
            identifier,
            detail,
            outcome: AuditOutcome::Rejected { status, reason },
            duration_ms,
        }
    }
}

/// Verdict recorded for one attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "verdict")]
pub enum AuditOutcome {
    /// Request passed every check.
    #[serde(rename = "allowed")]
    Allowed {
        /// HTTP status returned.
        status: u16,
    },
    /// Request was rejected.
    #[serde(rename = "rejected")]
    Rejected {
        /// HTTP status returned.
        status: u16,
        /// Stable machine-readable rejection reason.
        reason: String,
    },
}
