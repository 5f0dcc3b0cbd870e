//! Request authentication: signature recovery, HMAC verification, replay
//! protection, rate limiting, and bearer-token identity.

pub mod bearer;
pub mod headers;
pub mod hmac;
pub mod nonce;
pub mod rate_limit;
pub mod signature;

pub use bearer::{AuthContext, BearerVerifier};
pub use hmac::{HmacOutcome, HmacRequest, HmacVerifier};
pub use nonce::NonceStore;
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
