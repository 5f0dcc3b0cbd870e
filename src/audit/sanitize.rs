//! Request-detail sanitization for audit logging.
//!
//! Removes or redacts sensitive information from request details before
//! they are written to the audit log.

use serde_json::{Map, Value};

/// Keys whose values are redacted from audit logs.
const SENSITIVE_KEYS: &[&str] = &[
    "signature",
    "secret",
    "token",
    "authorization",
    "bearer",
    "key",
    "credential",
    "digest",
];

/// Maximum length for string values before truncation.
const MAX_STRING_LENGTH: usize = 1024;

/// Keys whose values are truncated if too long.
const TRUNCATABLE_KEYS: &[&str] = &["body", "payload", "message", "data", "content"];

/// Sanitize request detail for audit logging.
///
/// Redacts values under sensitive keys, truncates oversized payload
/// strings, and recurses through nested objects and arrays.
pub fn sanitize_detail(detail: &Value) -> Value {
    sanitize_value(detail, false)
}

fn sanitize_value(value: &Value, is_truncatable: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = Map::new();
            for (key, val) in map {
                let key_lower = key.to_lowercase();
                let is_sensitive = SENSITIVE_KEYS.iter().any(|&s| key_lower.contains(s));
                let should_truncate = TRUNCATABLE_KEYS.iter().any(|&s| key_lower.contains(s));

                let sanitized_val = if is_sensitive {
                    Value::String("[REDACTED]".to_string())
                } else {
                    sanitize_value(val, should_truncate)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_value(item, is_truncatable))
                .collect(),
        ),
        Value::String(s) if is_truncatable && s.len() > MAX_STRING_LENGTH => {
            let truncated: String = s.chars().take(MAX_STRING_LENGTH).collect();
            Value::String(format!("{}... [truncated {} bytes]", truncated, s.len()))
        }
        other => other.clone(),
    }
}
