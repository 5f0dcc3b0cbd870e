//! Inbound request metadata and recovery request types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Raw metadata for one inbound request, as the gate sees it.
///
/// The body is kept as raw bytes: HMAC verification must run over exactly
/// what arrived on the wire, independent of whether JSON parsing succeeds.
/// Header keys are lowercased on insertion.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// `Content-Type` header value, if present.
    pub content_type: Option<String>,
    /// All request headers, keys lowercased.
    pub headers: HashMap<String, String>,
    /// Raw body bytes, exactly as received.
    pub body: Vec<u8>,
    /// Bearer token from the `Authorization` header, scheme stripped.
    pub bearer: Option<String>,
}

impl RequestMeta {
    /// Create metadata for a JSON request with the given body.
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            headers: HashMap::new(),
            body,
            bearer: None,
        }
    }

    /// Attach a header (key is lowercased).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Override the content type.
    pub fn with_content_type(mut self, content_type: Option<&str>) -> Self {
        self.content_type = content_type.map(str::to_string);
        self
    }

    /// Attach a bearer token.
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    /// Whether the declared content type is JSON.
    ///
    /// Parameters (`; charset=utf-8`) are ignored.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .eq_ignore_ascii_case("application/json")
            })
            .unwrap_or(false)
    }
}

/// Body of a recovery validation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryRequest {
    pub farcaster_username: String,
    pub fid: u64,
    /// Candidate addresses, in linkage order. The first one the signature
    /// recovers to is treated as the recovered identity.
    pub addresses: Vec<String>,
    pub signature: String,
    pub message: String,
    pub nonce: String,
    /// Client-claimed signing time, epoch milliseconds.
    pub timestamp: u64,
}

/// Fields required in a recovery request body, in reporting order.
pub const RECOVERY_REQUIRED_FIELDS: &[&str] = &[
    "farcasterUsername",
    "fid",
    "addresses",
    "signature",
    "message",
    "nonce",
    "timestamp",
];

impl RecoveryRequest {
    /// The exact message the client must have signed.
    ///
    /// The message content is a contract, not just a payload: the server
    /// rebuilds it from the request fields and compares byte-for-byte, so
    /// a signature over any other text (however valid) is rejected.
    pub fn expected_message(&self) -> String {
        format!(
            "Verify address ownership for account recovery\n\
             Username: {}\n\
             FID: {}\n\
             Nonce: {}\n\
             Issued: {}",
            self.farcaster_username, self.fid, self.nonce, self.timestamp
        )
    }
}
