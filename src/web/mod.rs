//! Web 入口模块
//!
//! 提供触发探测的 HTTP 端点

use crate::orchestrator::RunOrchestrator;
use crate::probe::{ProbeOutcome, RunSummary, SummaryCounts};
use crate::registry::target::timestamp_serde;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

pub mod handlers;
pub mod server;

pub use server::{router, WebServer};

/// 触发端点路径
pub const KEEP_ALIVE_PATH: &str = "/api/cron/keep-alive";

/// Web 应用状态
#[derive(Clone)]
pub struct WebAppState {
    /// 运行编排器
    pub orchestrator: Arc<RunOrchestrator>,
    /// 共享密钥
    pub cron_secret: Option<Arc<str>>,
    /// 启动时间
    pub start_time: DateTime<Utc>,
}

impl WebAppState {
    pub fn new(orchestrator: Arc<RunOrchestrator>, cron_secret: Option<String>) -> Self {
        Self {
            orchestrator,
            cron_secret: cron_secret.map(Arc::from),
            start_time: Utc::now(),
        }
    }
}

/// 完成一次运行后的响应
#[derive(Debug, Serialize)]
pub struct KeepAliveResponse {
    pub message: &'static str,
    pub summary: SummaryCounts,
    pub results: Vec<ProbeOutcome>,
    #[serde(with = "timestamp_serde")]
    pub timestamp: DateTime<Utc>,
}

impl From<RunSummary> for KeepAliveResponse {
    fn from(summary: RunSummary) -> Self {
        Self {
            message: "Keep-alive completed",
            summary: summary.counts(),
            timestamp: summary.timestamp,
            results: summary.results,
        }
    }
}

/// 没有目标时的响应
#[derive(Debug, Serialize)]
pub struct NoTargetsResponse {
    pub message: &'static str,
    pub results: Vec<ProbeOutcome>,
    #[serde(with = "timestamp_serde")]
    pub timestamp: DateTime<Utc>,
}

impl NoTargetsResponse {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            message: "No projects to ping",
            results: Vec::new(),
            timestamp,
        }
    }
}

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// 进程存活响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}
