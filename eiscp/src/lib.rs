//! eISCP gateway - Rust implementation of an Integra/Onkyo receiver gateway
//!
//! The gateway keeps one TCP connection to an AV receiver speaking eISCP
//! (ethernet Integra Serial Communication Protocol), caches every property the
//! receiver reports and exposes get/set over REST.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `eiscp-core`: Commands, properties and error handling
//! - `eiscp-transport`: TCP transport
//! - `eiscp-session`: Framing, reassembly, keep-alive and reconnection
//! - `eiscp-client`: Property store, accessor and device controller
//! - `eiscp-server`: REST routes and the `eiscp-gateway` binary
//!
//! # Implementation Status
//!
//! ## ✅ 已完成
//! - eISCP 帧编码/解码与重组
//! - 会话层（保活探测、断线检测、自动重连）
//! - 属性缓存与 GET/SET
//! - REST 接口
//! - statsd 指标
//!
//! # Usage
//!
//! ```no_run
//! use eiscp::client::GatewayBuilder;
//! ```

// Re-export core types
pub use eiscp_core::{Command, EiscpError, EiscpResult, Parameter, Property, PropertyCode};
pub use eiscp_transport::DeviceAddress;

// Re-export session API
pub mod session {
    pub use eiscp_session::*;
}

// Re-export client API
pub mod client {
    pub use eiscp_client::*;
}

// Re-export server API
pub mod server {
    pub use eiscp_server::*;
}
