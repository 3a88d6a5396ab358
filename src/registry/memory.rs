//! 进程内注册表
//!
//! 与控制库相同的单调回写语义，记录全部调用，可注入读写失败

use crate::error::StoreError;
use crate::registry::target::{Target, TargetRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// 进程内注册表
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    /// 目标列表，保持注册顺序
    targets: RwLock<Vec<Target>>,
    /// 回写记录（目标ID，时间戳），包括失败的尝试
    writes: RwLock<Vec<(String, DateTime<Utc>)>>,
    /// 列表调用返回的错误
    list_failure: Option<StoreError>,
    /// 回写时会失败的目标
    failing_writes: HashSet<String>,
    /// 列表调用次数
    list_calls: AtomicUsize,
}

impl InMemoryRegistry {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets: RwLock::new(targets),
            ..Default::default()
        }
    }

    /// 让 `list_targets` 始终返回指定错误
    pub fn with_list_failure(mut self, error: StoreError) -> Self {
        self.list_failure = Some(error);
        self
    }

    /// 让指定目标的回写失败
    pub fn with_failing_write(mut self, target_id: impl Into<String>) -> Self {
        self.failing_writes.insert(target_id.into());
        self
    }

    /// 指定目标的最近成功时间
    pub async fn last_ping(&self, target_id: &str) -> Option<DateTime<Utc>> {
        self.targets
            .read()
            .await
            .iter()
            .find(|t| t.id == target_id)
            .and_then(|t| t.last_ping)
    }

    /// 全部回写尝试
    pub async fn writes(&self) -> Vec<(String, DateTime<Utc>)> {
        self.writes.read().await.clone()
    }

    /// `list_targets` 被调用的次数
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetRegistry for InMemoryRegistry {
    async fn list_targets(&self) -> Result<Vec<Target>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.list_failure {
            return Err(error.clone());
        }
        Ok(self.targets.read().await.clone())
    }

    async fn record_success(
        &self,
        target_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.writes
            .write()
            .await
            .push((target_id.to_string(), timestamp));

        if self.failing_writes.contains(target_id) {
            return Err(StoreError::WriteFailed {
                target_id: target_id.to_string(),
                reason: "injected write failure".to_string(),
            });
        }

        // 与 PATCH 一致：没有匹配行时不报错
        let mut targets = self.targets.write().await;
        if let Some(target) = targets.iter_mut().find(|t| t.id == target_id) {
            if target.last_ping.is_none_or(|current| current < timestamp) {
                target.last_ping = Some(timestamp);
            }
        }
        Ok(())
    }
}
