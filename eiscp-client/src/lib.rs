//! eISCP gateway client
//!
//! This crate keeps a cache of receiver properties fed by the session read
//! loop, answers get/set requests against it, and supervises the single device
//! connection.
//!
//! # TODO
//!
//! ## 连接管理
//! - [x] 网关构建器（Builder）模式实现
//! - [x] 设备切换（先拆除旧会话再连接新设备）
//! - [x] 自动重连机制
//! - [x] 连接状态查询
//!
//! ## 属性访问
//! - [x] 属性缓存
//! - [x] GET 操作（1 秒等待）
//! - [x] SET 操作（等待设备确认）
//!
//! ## 统计
//! - [x] statsd 指标上报

pub mod accessor;
pub mod builder;
pub mod controller;
pub mod metrics;
pub mod store;
pub mod updater;

pub use accessor::{CommandSender, PropertyAccessor, DEFAULT_WAIT};
pub use builder::{Gateway, GatewayBuilder};
pub use controller::{ControllerStatus, GatewayController};
pub use metrics::{MetricsSink, NoopMetrics, StatsdMetrics, DEFAULT_FLUSH_INTERVAL};
pub use store::PropertyStore;
pub use updater::PropertyUpdater;
