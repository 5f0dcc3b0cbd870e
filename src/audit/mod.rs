//! Audit logging module.
//!
//! One structured audit record is written per gated attempt, success or
//! failure, before the verdict is returned to the caller. Records are JSON
//! lines for easy ingestion by log analysis tools, with sensitive values
//! (signatures, secrets, tokens) redacted and large payload fields
//! truncated before they reach disk.

mod entry;
mod logger;
mod sanitize;

pub use entry::{AuditEntry, AuditOutcome};
pub use logger::AuditLogger;
pub use sanitize::sanitize_detail;
