//! 目标注册表模块
//!
//! 提供目标列表读取和成功时间回写

pub mod memory;
pub mod rest;
pub mod target;

// 重新导出主要类型
pub use memory::InMemoryRegistry;
pub use rest::RestRegistry;
pub use target::{format_timestamp, Target, TargetRegistry};
