//! Error types for the gateward daemon.

use thiserror::Error;

/// Main error type for the gate.
///
/// Every variant maps to an HTTP status, a stable machine-readable reason
/// code, and a client-safe message. No error is allowed to propagate past
/// the request gate; each one becomes a typed rejection verdict.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Request validation errors (malformed or missing fields).
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Authentication and verification errors.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Unexpected request content type.
    #[error("Unsupported content type: {supplied:?}")]
    UnsupportedContentType { supplied: Option<String> },

    /// Per-identifier rate limit exhausted.
    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Authentication error kinds.
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("Webhook source has no shared secret configured")]
    NotConfigured,

    #[error("No accepted signature header present")]
    MissingSignature,

    #[error("HMAC digest mismatch")]
    DigestMismatch,

    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfRange,

    #[error("Signed message expired: age {age_seconds}s exceeds maximum")]
    SignatureExpired { age_seconds: i64 },

    #[error("Nonce already used (replay attack detected)")]
    NonceReused,

    #[error("Signature does not recover to any candidate address")]
    InvalidSignature,

    #[error("Malformed bearer token")]
    MalformedBearer,
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Malformed JSON body: {message}")]
    MalformedJson { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Signed message does not match the expected format")]
    MessageMismatch,

    // Field is deliberately not named `source`: thiserror reserves that
    // name for the underlying error cause.
    #[error("Unknown webhook source: {name}")]
    UnknownSource { name: String },
}

impl GateError {
    /// HTTP status code for this error.
    ///
    /// Recovery-flow signature failures are 400 (the caller supplied a bad
    /// proof); webhook HMAC failures are 401 (the caller is unauthenticated).
    pub fn status(&self) -> u16 {
        match self {
            GateError::Config { .. } => 401, // fail-closed
            GateError::Validation {
                kind: ValidationErrorKind::UnknownSource { .. },
            } => 404,
            GateError::Validation { .. } => 400,
            GateError::Auth { kind } => match kind {
                AuthErrorKind::NotConfigured
                | AuthErrorKind::MissingSignature
                | AuthErrorKind::DigestMismatch
                | AuthErrorKind::TimestampOutOfRange
                | AuthErrorKind::MalformedBearer => 401,
                AuthErrorKind::SignatureExpired { .. }
                | AuthErrorKind::NonceReused
                | AuthErrorKind::InvalidSignature => 400,
            },
            GateError::UnsupportedContentType { .. } => 415,
            GateError::RateLimited { .. } => 429,
            GateError::Io(_) | GateError::Serialization(_) => 500,
        }
    }

    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            GateError::Config { .. } => "not_configured",
            GateError::Validation { kind } => match kind {
                ValidationErrorKind::MalformedJson { .. } => "malformed_json",
                ValidationErrorKind::MissingField { .. } => "missing_field",
                ValidationErrorKind::MessageMismatch => "invalid_message_format",
                ValidationErrorKind::UnknownSource { .. } => "unknown_source",
            },
            GateError::Auth { kind } => match kind {
                AuthErrorKind::NotConfigured => "not_configured",
                AuthErrorKind::MissingSignature => "missing_signature",
                AuthErrorKind::DigestMismatch => "invalid_signature",
                AuthErrorKind::TimestampOutOfRange => "timestamp_out_of_range",
                AuthErrorKind::SignatureExpired { .. } => "signature_expired",
                AuthErrorKind::NonceReused => "nonce_already_used",
                AuthErrorKind::InvalidSignature => "invalid_signature",
                AuthErrorKind::MalformedBearer => "malformed_bearer",
            },
            GateError::UnsupportedContentType { .. } => "unsupported_content_type",
            GateError::RateLimited { .. } => "rate_limited",
            GateError::Io(_) => "internal_error",
            GateError::Serialization(_) => "internal_error",
        }
    }

    /// Client-safe message for this error.
    ///
    /// Detailed messages stay in server-side logs; clients receive a short
    /// generic description keyed off the reason code.
    pub fn client_message(&self) -> &'static str {
        match self.reason() {
            "not_configured" => "Webhook verification not configured",
            "malformed_json" => "Invalid JSON body",
            "missing_field" => "Missing required field",
            "invalid_message_format" => "Invalid message format",
            "unknown_source" => "Unknown webhook source",
            "missing_signature" => "Missing signature",
            "invalid_signature" => "Invalid signature",
            "timestamp_out_of_range" => "Timestamp out of range",
            "signature_expired" => "Signature expired",
            "nonce_already_used" => "Nonce already used",
            "malformed_bearer" => "Invalid authorization token",
            "unsupported_content_type" => "Unsupported content type",
            "rate_limited" => "Too many requests",
            _ => "An error occurred",
        }
    }
}

/// Result type alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;
