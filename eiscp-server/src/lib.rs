//! REST front end for the eISCP gateway
//!
//! This crate exposes the gateway over HTTP and carries the command-line
//! configuration of the `eiscp-gateway` binary.

pub mod config;
pub mod routes;

pub use config::Args;
pub use routes::{router, AppState};
