//! Error types for the gateward daemon.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
