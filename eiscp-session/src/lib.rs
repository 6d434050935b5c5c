//! Session layer module for the eISCP protocol
//!
//! This crate turns a raw TCP byte stream into eISCP commands and back:
//!
//! - frame encoding and decoding, with reassembly of split or coalesced reads
//! - per-model header bytes
//! - a connection session with a dedicated writer task and keep-alive stall
//!   detection
//! - dialling with a fixed retry interval
//!
//! # TODO
//!
//! - [x] eISCP 帧编码/解码
//! - [x] 分段和粘包重组
//! - [x] 型号表
//! - [x] 会话状态机
//! - [x] 保活探测与断线检测
//! - [x] 会话统计信息
//! - [ ] 设备自动发现（UDP 广播）

pub mod config;
pub mod decoder;
pub mod frame;
pub mod liveness;
pub mod model;
pub mod session;
pub mod state;
pub mod statistics;

pub use config::SessionConfig;
pub use decoder::{FrameDecoder, DEFAULT_MAX_PAYLOAD};
pub use eiscp_core::{EiscpError, EiscpResult};
pub use frame::{Frame, FrameHeader, HEADER_LENGTH, MAGIC};
pub use liveness::{Liveness, LivenessCheck};
pub use model::{ModelProfile, ModelTable, DEFAULT_MODEL};
pub use session::{dial, ConnectionSession, InboundHandler, SessionExit, SessionLink};
pub use state::SessionState;
pub use statistics::SessionStatistics;
