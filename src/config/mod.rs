//! Configuration loading for the gateward daemon.

mod settings;

pub use settings::*;
