//! 探测模块
//!
//! 提供目标存活检查、两级探测策略和结果数据结构

pub mod check;
pub mod outcome;
pub mod strategy;

// 重新导出主要类型
pub use check::{CheckVerdict, LivenessCheck, PostgrestCheck};
pub use outcome::{ProbeOutcome, ProbeStatus, RunSummary, SummaryCounts};
pub use strategy::{Liveness, ProbeStrategy};
