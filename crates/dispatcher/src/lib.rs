//! # Dispatcher
//!
//! 邮件分发模块。
//!
//! 负责：
//! - 启动 producer 与固定数量的 worker
//! - worker 渲染并投递每一位收件人，失败只记录不中断
//! - 汇总结果为 `DispatchReport`，支持取消与超时

pub mod coordinator;
pub mod error;
pub mod transports;
pub mod worker;

pub use contracts::{DeliveryTransport, DispatchReport, MessageRenderer};
pub use coordinator::{DispatchConfig, DispatchCoordinator};
pub use error::DispatchError;
pub use transports::{
    ConfiguredTransport, FileTransport, FileTransportConfig, LogTransport, SmtpTransport,
    SmtpTransportConfig, build_transport,
};
pub use worker::{WorkerState, WorkerStats};
