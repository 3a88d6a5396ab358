//! 目标数据结构与注册表接口

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 已注册的远程数据库目标
///
/// 一次运行期间视为只读输入，探测器只会回写 `last_ping`。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// 唯一标识，控制库中可能是 uuid 也可能是整数
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// 展示名称
    pub name: String,
    /// 目标基础地址
    pub url: String,
    /// 目标访问密钥
    pub api_key: String,
    /// 最近一次成功探测时间，`None` 表示从未成功
    #[serde(default)]
    pub last_ping: Option<DateTime<Utc>>,
}

impl Target {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            api_key: api_key.into(),
            last_ping: None,
        }
    }
}

// 密钥不进日志
impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("last_ping", &self.last_ping)
            .finish()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

/// 以毫秒精度的 ISO-8601 UTC 格式化时间戳，例如 `2024-01-01T00:00:00.000Z`
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `format_timestamp` 的 serde 适配
pub mod timestamp_serde {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(timestamp))
    }
}

/// 目标注册表接口
///
/// 注册表由外部维护，探测核心只需要列出目标和回写成功时间两项能力。
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    /// 按注册表顺序列出所有目标
    ///
    /// # 错误
    /// * `StoreError::NotConfigured` - 控制库未配置
    /// * `StoreError::Unavailable` - 控制库不可达或响应无法解析
    async fn list_targets(&self) -> Result<Vec<Target>, StoreError>;

    /// 回写目标的最近成功时间
    ///
    /// 写入是单调的：较旧的时间戳不会覆盖较新的值，重复写入同一时间戳无副作用。
    async fn record_success(
        &self,
        target_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
