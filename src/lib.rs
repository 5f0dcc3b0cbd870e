//! Gateward Library
//!
//! This crate provides the request-integrity core that protects public write
//! endpoints (webhook ingestion, account recovery, frame APIs) from forgery,
//! replay, and abuse. The HTTP layer in [`server`] is thin glue; all
//! accept/reject decisions are made by [`gate::RequestGate`].

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod server;
pub mod store;
