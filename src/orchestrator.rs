//! 运行编排模块
//!
//! 读取目标列表，逐个探测，成功后回写 last_ping，并汇总为一次运行的结果

use crate::config::ProbeConfig;
use crate::error::RunError;
use crate::probe::outcome::RUN_DEADLINE_MESSAGE;
use crate::probe::{ProbeOutcome, ProbeStrategy, RunSummary};
use crate::registry::{Target, TargetRegistry};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// 单个目标回写 last_ping 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampOutcome {
    /// 已写入
    Written,
    /// 探测失败，不写入
    Skipped,
    /// 写入失败，已记录日志并丢弃错误
    Failed,
}

/// 运行编排器
pub struct RunOrchestrator {
    /// 目标注册表
    registry: Arc<dyn TargetRegistry>,
    /// 探测策略
    strategy: Arc<ProbeStrategy>,
    /// 最大并发探测数
    max_concurrent: usize,
    /// 整次运行的截止时间
    run_timeout: Duration,
}

impl RunOrchestrator {
    /// 创建新的运行编排器
    ///
    /// # 参数
    /// * `registry` - 目标注册表
    /// * `strategy` - 探测策略
    /// * `config` - 探测配置，提供并发上限和运行截止时间
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        strategy: Arc<ProbeStrategy>,
        config: &ProbeConfig,
    ) -> Self {
        Self {
            registry,
            strategy,
            max_concurrent: config.max_concurrent_probes.max(1),
            run_timeout: config.run_timeout(),
        }
    }

    /// 执行一次完整运行
    ///
    /// 只有无法列出目标会让运行整体失败；单个目标的失败和运行截止时间
    /// 都只体现在对应目标的结果中。
    ///
    /// # 错误
    /// * `RunError::StoreUnavailable` - 无法列出目标，不返回部分结果
    pub async fn run_cycle(&self) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("keep_alive_run", %run_id);

        async move {
            let targets = self.registry.list_targets().await.map_err(|e| {
                error!("读取目标列表失败: {}", e);
                RunError::from(e)
            })?;

            let timestamp = Utc::now();
            Ok(self.probe_targets(run_id, &targets, timestamp).await)
        }
        .instrument(span)
        .await
    }

    /// 探测给定目标并汇总
    ///
    /// 结果顺序与输入顺序一致，与并发度无关。空列表不会触发任何注册表调用。
    /// 超过运行截止时间后，尚未产出结果的目标记为错误结果，汇总始终覆盖全部目标。
    pub async fn probe_targets(
        &self,
        run_id: Uuid,
        targets: &[Target],
        timestamp: DateTime<Utc>,
    ) -> RunSummary {
        let mut summary = RunSummary::new(run_id, timestamp);
        if targets.is_empty() {
            info!("没有需要探测的目标");
            return summary;
        }

        info!(
            "开始探测 {} 个目标，最大并发: {}",
            targets.len(),
            self.max_concurrent
        );

        let deadline = Instant::now() + self.run_timeout;

        // buffered 按提交顺序产出结果
        let mut outcomes = stream::iter(targets.iter().cloned())
            .map(move |target| self.probe_one(target, timestamp))
            .buffered(self.max_concurrent);

        loop {
            match timeout_at(deadline, outcomes.next()).await {
                Ok(Some((outcome, stamp))) => {
                    if stamp == StampOutcome::Failed {
                        summary.write_failures += 1;
                    }
                    summary.results.push(outcome);
                }
                Ok(None) => break,
                Err(_) => {
                    let unfinished = &targets[summary.results.len()..];
                    error!(
                        "运行超过截止时间 {}s，{} 个目标未完成",
                        self.run_timeout.as_secs_f64(),
                        unfinished.len()
                    );
                    summary.results.extend(unfinished.iter().map(|target| {
                        ProbeOutcome::error(target.name.clone(), RUN_DEADLINE_MESSAGE, timestamp)
                    }));
                    break;
                }
            }
        }

        let counts = summary.counts();
        info!(
            "探测完成: 总数 {}, 成功 {}, 失败 {}, 回写失败 {}",
            counts.total, counts.success, counts.errors, summary.write_failures
        );
        summary
    }

    /// 探测单个目标，成功时回写 last_ping
    async fn probe_one(
        &self,
        target: Target,
        timestamp: DateTime<Utc>,
    ) -> (ProbeOutcome, StampOutcome) {
        let outcome = self.strategy.probe(&target, timestamp).await;
        if !outcome.status.is_success() {
            return (outcome, StampOutcome::Skipped);
        }

        // 回写失败只记录，不改变探测结果，也不中断运行
        let stamp = match self.registry.record_success(&target.id, timestamp).await {
            Ok(()) => {
                debug!("已回写 last_ping: {}", target.name);
                StampOutcome::Written
            }
            Err(e) => {
                warn!("回写 last_ping 失败，探测结果保持成功: {} - {}", target.name, e);
                StampOutcome::Failed
            }
        };
        (outcome, stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProbeError, StoreError};
    use crate::probe::{CheckVerdict, LivenessCheck, ProbeStatus};
    use crate::registry::InMemoryRegistry;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// 按目标名返回预设结果，可为每个目标设置延迟
    #[derive(Default)]
    struct TableCheck {
        primary: HashMap<String, std::result::Result<CheckVerdict, ProbeError>>,
        delays: HashMap<String, Duration>,
    }

    #[async_trait]
    impl LivenessCheck for TableCheck {
        async fn primary(&self, target: &Target) -> std::result::Result<CheckVerdict, ProbeError> {
            if let Some(delay) = self.delays.get(&target.name) {
                tokio::time::sleep(*delay).await;
            }
            self.primary
                .get(&target.name)
                .cloned()
                .unwrap_or(Ok(CheckVerdict::Passed))
        }

        async fn fallback(&self, _target: &Target) -> std::result::Result<CheckVerdict, ProbeError> {
            Ok(CheckVerdict::Rejected {
                status: 404,
                reason: "HTTP 404 Not Found".to_string(),
            })
        }
    }

    fn targets(names: &[&str]) -> Vec<Target> {
        names
            .iter()
            .map(|n| Target::new(*n, *n, format!("https://{}.supabase.co", n), "key"))
            .collect()
    }

    fn orchestrator(
        registry: Arc<InMemoryRegistry>,
        check: TableCheck,
        max_concurrent: usize,
    ) -> RunOrchestrator {
        let strategy = ProbeStrategy::new(Arc::new(check), Duration::from_millis(500));
        let config = ProbeConfig {
            max_concurrent_probes: max_concurrent,
            ..Default::default()
        };
        RunOrchestrator::new(registry, Arc::new(strategy), &config)
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = Arc::new(InMemoryRegistry::new(vec![]));
        let summary = orchestrator(registry.clone(), TableCheck::default(), 4)
            .run_cycle()
            .await
            .unwrap();

        assert!(summary.is_empty());
        assert_eq!(summary.counts().total, 0);
        assert_eq!(registry.list_calls(), 1);
        assert!(registry.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_unavailable_fails_run() {
        let registry = Arc::new(
            InMemoryRegistry::new(targets(&["a"]))
                .with_list_failure(StoreError::Unavailable("connection reset".to_string())),
        );
        let result = orchestrator(registry.clone(), TableCheck::default(), 4)
            .run_cycle()
            .await;

        assert_eq!(
            result.unwrap_err(),
            RunError::StoreUnavailable(StoreError::Unavailable("connection reset".to_string()))
        );
        assert!(registry.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_error_does_not_stop_later_targets() {
        let registry = Arc::new(InMemoryRegistry::new(targets(&["a", "b", "c"])));
        let mut check = TableCheck::default();
        check.primary.insert(
            "a".to_string(),
            Err(ProbeError::Transport("Connection refused".to_string())),
        );

        let summary = orchestrator(registry.clone(), check, 1)
            .run_cycle()
            .await
            .unwrap();

        let statuses: Vec<ProbeStatus> = summary.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![ProbeStatus::Error, ProbeStatus::Success, ProbeStatus::Success]
        );
        assert_eq!(summary.results[0].message, "Connection refused");

        // 只有成功的目标被回写，且时间戳为本次运行时间
        let writes = registry.writes().await;
        assert_eq!(
            writes,
            vec![
                ("b".to_string(), summary.timestamp),
                ("c".to_string(), summary.timestamp)
            ]
        );
        assert_eq!(registry.last_ping("a").await, None);
    }

    #[tokio::test]
    async fn test_order_preserved_under_concurrency() {
        let names = ["slow", "medium", "fast", "instant"];
        let registry = Arc::new(InMemoryRegistry::new(targets(&names)));
        let mut check = TableCheck::default();
        check.delays.insert("slow".to_string(), Duration::from_millis(120));
        check.delays.insert("medium".to_string(), Duration::from_millis(60));
        check.delays.insert("fast".to_string(), Duration::from_millis(10));

        let summary = orchestrator(registry, check, 4).run_cycle().await.unwrap();

        let order: Vec<&str> = summary.results.iter().map(|r| r.project.as_str()).collect();
        assert_eq!(order, names.to_vec());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_success() {
        let registry = Arc::new(
            InMemoryRegistry::new(targets(&["a", "b"])).with_failing_write("a"),
        );
        let summary = orchestrator(registry.clone(), TableCheck::default(), 2)
            .run_cycle()
            .await
            .unwrap();

        assert!(summary.results.iter().all(|r| r.status == ProbeStatus::Success));
        assert_eq!(summary.write_failures, 1);
        assert_eq!(registry.last_ping("a").await, None);
        assert_eq!(registry.last_ping("b").await, Some(summary.timestamp));
    }

    #[tokio::test]
    async fn test_counts_are_consistent() {
        let registry = Arc::new(InMemoryRegistry::new(targets(&["a", "b", "c", "d", "e"])));
        let mut check = TableCheck::default();
        for name in ["b", "d"] {
            check.primary.insert(
                name.to_string(),
                Err(ProbeError::Transport("Request timeout".to_string())),
            );
        }

        let summary = orchestrator(registry, check, 3).run_cycle().await.unwrap();
        let counts = summary.counts();
        assert_eq!(counts.total, 5);
        assert_eq!(counts.success, 3);
        assert_eq!(counts.errors, 2);
        assert_eq!(counts.success + counts.errors, summary.results.len());
    }

    #[tokio::test]
    async fn test_run_deadline_keeps_finished_outcomes() {
        let registry = Arc::new(InMemoryRegistry::new(targets(&["a", "b", "c"])));
        let mut check = TableCheck::default();
        check.delays.insert("a".to_string(), Duration::from_millis(20));
        check.delays.insert("b".to_string(), Duration::from_secs(5));
        check.delays.insert("c".to_string(), Duration::from_millis(20));

        let strategy = ProbeStrategy::new(Arc::new(check), Duration::from_secs(10));
        let mut orchestrator =
            RunOrchestrator::new(registry.clone(), Arc::new(strategy), &ProbeConfig::default());
        orchestrator.max_concurrent = 1;
        orchestrator.run_timeout = Duration::from_millis(300);

        let summary = orchestrator.run_cycle().await.unwrap();

        let order: Vec<&str> = summary.results.iter().map(|r| r.project.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(summary.results[0].status, ProbeStatus::Success);
        for outcome in &summary.results[1..] {
            assert_eq!(outcome.status, ProbeStatus::Error);
            assert_eq!(outcome.message, RUN_DEADLINE_MESSAGE);
            assert_eq!(outcome.timestamp, summary.timestamp);
        }

        let counts = summary.counts();
        assert_eq!((counts.total, counts.success, counts.errors), (3, 1, 2));
        assert_eq!(
            registry.writes().await,
            vec![("a".to_string(), summary.timestamp)]
        );
    }
}
