//! 基于 PostgREST 的控制库客户端
//!
//! 控制库是一个 Supabase 项目，目标存放在 `{url}/rest/v1/{table}` 中

use crate::config::ControlStoreConfig;
use crate::error::{Result, StoreError};
use crate::registry::target::{format_timestamp, Target, TargetRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// PostgREST 错误响应体
#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
}

/// 控制库注册表客户端
pub struct RestRegistry {
    /// HTTP客户端
    client: Client,
    /// 控制库基础地址
    base_url: Option<String>,
    /// 控制库访问密钥
    api_key: Option<String>,
    /// 目标表名
    table: String,
}

impl RestRegistry {
    /// 根据控制库配置创建客户端
    ///
    /// 地址或密钥缺失不会导致创建失败，而是在每次访问时返回 `StoreError::NotConfigured`。
    pub fn new(config: &ControlStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()?;

        Ok(Self {
            client,
            base_url: non_blank(config.url.as_deref()),
            api_key: non_blank(config.api_key.as_deref()),
            table: config.table.clone(),
        })
    }

    /// 是否已配置控制库
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }

    fn table_endpoint(&self) -> std::result::Result<(String, &str), StoreError> {
        match (&self.base_url, &self.api_key) {
            (Some(base), Some(key)) => Ok((
                format!("{}/rest/v1/{}", base.trim_end_matches('/'), self.table),
                key.as_str(),
            )),
            _ => Err(StoreError::NotConfigured),
        }
    }

    fn authorized(request: RequestBuilder, key: &str) -> RequestBuilder {
        request
            .header("apikey", key)
            .header("Authorization", format!("Bearer {}", key))
    }

    /// 从非 2xx 响应中提取错误描述
    async fn describe_failure(response: Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        serde_json::from_str::<PostgrestErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| {
                format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                )
            })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl TargetRegistry for RestRegistry {
    async fn list_targets(&self) -> std::result::Result<Vec<Target>, StoreError> {
        let (endpoint, key) = self.table_endpoint()?;

        let response = Self::authorized(self.client.get(&endpoint), key)
            .query(&[("select", "*")])
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("control store request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(StoreError::Unavailable(Self::describe_failure(response).await));
        }

        let targets: Vec<Target> = response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid project rows: {}", e)))?;

        debug!("从控制库读取到 {} 个目标", targets.len());
        Ok(targets)
    }

    async fn record_success(
        &self,
        target_id: &str,
        timestamp: DateTime<Utc>,
    ) -> std::result::Result<(), StoreError> {
        let (endpoint, key) = self.table_endpoint()?;
        let stamp = format_timestamp(&timestamp);

        let write_failed = |reason: String| StoreError::WriteFailed {
            target_id: target_id.to_string(),
            reason,
        };

        // or 过滤保证只会向前推进 last_ping
        let response = Self::authorized(self.client.patch(&endpoint), key)
            .query(&[
                ("id", format!("eq.{}", target_id)),
                ("or", format!("(last_ping.is.null,last_ping.lt.{})", stamp)),
            ])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "last_ping": stamp }))
            .send()
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        if !response.status().is_success() {
            let reason = Self::describe_failure(response).await;
            warn!("回写 last_ping 被控制库拒绝: {} - {}", target_id, reason);
            return Err(write_failed(reason));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_registry() {
        let registry = RestRegistry::new(&ControlStoreConfig::default()).unwrap();
        assert!(!registry.is_configured());
        assert_eq!(registry.table_endpoint().unwrap_err(), StoreError::NotConfigured);
    }

    #[test]
    fn test_blank_credentials_count_as_missing() {
        let config = ControlStoreConfig {
            url: Some("https://control.supabase.co".to_string()),
            api_key: Some("  ".to_string()),
            ..Default::default()
        };
        let registry = RestRegistry::new(&config).unwrap();
        assert!(!registry.is_configured());
    }

    #[test]
    fn test_table_endpoint_trims_trailing_slash() {
        let config = ControlStoreConfig {
            url: Some("https://control.supabase.co/".to_string()),
            api_key: Some("key".to_string()),
            table: "targets".to_string(),
            ..Default::default()
        };
        let registry = RestRegistry::new(&config).unwrap();
        let (endpoint, key) = registry.table_endpoint().unwrap();
        assert_eq!(endpoint, "https://control.supabase.co/rest/v1/targets");
        assert_eq!(key, "key");
    }

    #[tokio::test]
    async fn test_list_targets_unconfigured() {
        let registry = RestRegistry::new(&ControlStoreConfig::default()).unwrap();
        let result = registry.list_targets().await;
        assert_eq!(result.unwrap_err(), StoreError::NotConfigured);
    }
}
