//! 探测结果数据结构
//!
//! 单目标结果与整次运行汇总，只存在于一次运行期间

use crate::registry::target::timestamp_serde;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// 主检查通过
pub const PRIMARY_OK_MESSAGE: &str = "primary check succeeded";
/// 回退检查通过
pub const FALLBACK_OK_MESSAGE: &str = "fallback check succeeded";
/// 两项检查都未通过但没有传输错误
pub const REACHABLE_MESSAGE: &str = "connection established, no verifiable resource";
/// 运行截止时间到达时仍未完成
pub const RUN_DEADLINE_MESSAGE: &str = "run deadline exceeded";

/// 探测状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Success,
    Error,
}

impl ProbeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeStatus::Success)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Success => write!(f, "success"),
            ProbeStatus::Error => write!(f, "error"),
        }
    }
}

/// 单个目标的探测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    /// 目标展示名称
    pub project: String,
    /// 探测状态
    pub status: ProbeStatus,
    /// 结果描述，错误时为错误文本
    pub message: String,
    /// 本次运行的时间戳
    #[serde(with = "timestamp_serde")]
    pub timestamp: DateTime<Utc>,
}

impl ProbeOutcome {
    pub fn success(project: impl Into<String>, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            project: project.into(),
            status: ProbeStatus::Success,
            message: message.into(),
            timestamp,
        }
    }

    pub fn error(project: impl Into<String>, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            project: project.into(),
            status: ProbeStatus::Error,
            message: message.into(),
            timestamp,
        }
    }
}

/// 计数汇总，对应响应中的 `summary`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
}

/// 一次运行的汇总
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// 运行ID，用于关联日志
    pub run_id: Uuid,
    /// 运行时间戳，同时作为回写的 last_ping
    pub timestamp: DateTime<Utc>,
    /// 按注册表顺序排列的结果
    pub results: Vec<ProbeOutcome>,
    /// 回写失败的次数，不影响结果状态
    pub write_failures: usize,
}

impl RunSummary {
    pub fn new(run_id: Uuid, timestamp: DateTime<Utc>) -> Self {
        Self {
            run_id,
            timestamp,
            results: Vec::new(),
            write_failures: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// 扫描结果序列计算计数
    pub fn counts(&self) -> SummaryCounts {
        let success = self
            .results
            .iter()
            .filter(|r| r.status.is_success())
            .count();
        SummaryCounts {
            total: self.total(),
            success,
            errors: self.total() - success,
        }
    }
}
