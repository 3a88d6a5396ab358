//! 两级探测策略
//!
//! 主检查未通过时执行一次回退检查，并把结果归类为运行结果

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::probe::check::{CheckVerdict, LivenessCheck, PostgrestCheck};
use crate::probe::outcome::{
    ProbeOutcome, FALLBACK_OK_MESSAGE, PRIMARY_OK_MESSAGE, REACHABLE_MESSAGE,
};
use crate::registry::Target;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// 存活判定
///
/// 三种判定都算成功。目标的表结构未知，资源不存在不能等同于不可达，
/// 所以只要两次检查都没有传输错误，就认为连接已建立。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// 主检查通过
    Primary,
    /// 主检查未通过，回退检查通过
    Fallback,
    /// 两次检查都被拒绝，但目标有应答
    Reachable,
}

impl Liveness {
    pub fn message(&self) -> &'static str {
        match self {
            Liveness::Primary => PRIMARY_OK_MESSAGE,
            Liveness::Fallback => FALLBACK_OK_MESSAGE,
            Liveness::Reachable => REACHABLE_MESSAGE,
        }
    }
}

/// 根据回退检查的判定归类
pub fn classify_fallback(fallback: &CheckVerdict) -> Liveness {
    match fallback {
        CheckVerdict::Passed => Liveness::Fallback,
        CheckVerdict::Rejected { .. } => Liveness::Reachable,
    }
}

/// 探测策略
pub struct ProbeStrategy {
    /// 存活检查实现
    check: Arc<dyn LivenessCheck>,
    /// 单目标超时，覆盖两次检查
    timeout: Duration,
}

impl ProbeStrategy {
    pub fn new(check: Arc<dyn LivenessCheck>, timeout: Duration) -> Self {
        Self { check, timeout }
    }

    /// 使用 PostgREST 检查创建策略
    pub fn from_config(config: &ProbeConfig) -> Result<Self> {
        let check = PostgrestCheck::new(config)?;
        Ok(Self::new(Arc::new(check), config.target_timeout()))
    }

    /// 执行两级检查
    ///
    /// 任一检查出现传输错误都直接返回，不再尝试其它检查。
    pub async fn assess(&self, target: &Target) -> std::result::Result<Liveness, ProbeError> {
        let checks = async {
            match self.check.primary(target).await? {
                CheckVerdict::Passed => return Ok(Liveness::Primary),
                CheckVerdict::Rejected { status, reason } => {
                    debug!("主检查未通过，尝试回退检查: {} ({} {})", target.name, status, reason);
                }
            }

            let fallback = self.check.fallback(target).await?;
            if let CheckVerdict::Rejected { status, reason } = &fallback {
                debug!("回退检查未通过: {} ({} {})", target.name, status, reason);
            }
            Ok::<_, ProbeError>(classify_fallback(&fallback))
        };

        timeout(self.timeout, checks)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }

    /// 探测单个目标，所有失败路径都归入结果，不向调用者返回错误
    pub async fn probe(&self, target: &Target, timestamp: DateTime<Utc>) -> ProbeOutcome {
        match self.assess(target).await {
            Ok(liveness) => {
                debug!("目标探测成功: {} - {}", target.name, liveness.message());
                ProbeOutcome::success(target.name.clone(), liveness.message(), timestamp)
            }
            Err(e) => {
                warn!("目标探测失败: {} - {}", target.name, e);
                ProbeOutcome::error(target.name.clone(), e.to_string(), timestamp)
            }
        }
    }
}
