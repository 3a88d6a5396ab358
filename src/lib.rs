//! DB Keepalive - 按需探测托管数据库，防止其因空闲被暂停
//!
//! 这是一个用Rust编写的保活服务，支持：
//! - 从控制库读取目标项目列表
//! - 两级 PostgREST 存活检查
//! - 成功后回写 last_ping
//! - Bearer 共享密钥保护的触发端点
//! - 结构化日志记录

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod probe;
pub mod registry;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use error::{KeepAliveError, ProbeError, RunError, StoreError};
pub use orchestrator::RunOrchestrator;
pub use probe::{ProbeOutcome, ProbeStatus, ProbeStrategy, RunSummary};
pub use registry::{Target, TargetRegistry};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
