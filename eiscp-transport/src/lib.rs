//! Transport layer module for the eISCP protocol
//!
//! This crate provides the TCP transport used to reach a receiver. A connected
//! transport is split into a reader half, owned by the session read loop, and a
//! writer half, owned by the session writer task.

pub mod stream;
pub mod tcp;

pub use eiscp_core::{EiscpError, EiscpResult};
pub use stream::{StreamReader, StreamWriter};
pub use tcp::{DEFAULT_DEVICE_PORT, DeviceAddress, TcpReader, TcpSettings, TcpTransport, TcpWriter};
