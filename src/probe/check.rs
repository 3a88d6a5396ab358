//! 目标存活检查实现
//!
//! 主检查和回退检查都是对目标 PostgREST 接口的只读 HEAD 请求

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::registry::Target;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

/// 单次检查的判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckVerdict {
    /// 目标应答且资源可读
    Passed,
    /// 目标应答了，但资源不可验证（不存在、无权限等）
    Rejected { status: u16, reason: String },
}

/// 存活检查trait
///
/// `Err` 只用于传输层失败；目标返回非 2xx 属于 `Ok(CheckVerdict::Rejected)`。
#[async_trait]
pub trait LivenessCheck: Send + Sync {
    /// 主检查
    async fn primary(&self, target: &Target) -> std::result::Result<CheckVerdict, ProbeError>;

    /// 回退检查，只在主检查未通过时执行
    async fn fallback(&self, target: &Target) -> std::result::Result<CheckVerdict, ProbeError>;
}

/// 基于 PostgREST 的存活检查
pub struct PostgrestCheck {
    /// HTTP客户端
    client: Client,
    /// 主检查资源
    primary_resource: String,
    /// 回退检查资源
    fallback_resource: String,
}

impl PostgrestCheck {
    /// 创建新的检查器
    ///
    /// # 参数
    /// * `config` - 探测配置，单个请求的超时取单目标超时
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.target_timeout())
            .connect_timeout(config.target_timeout().min(Duration::from_secs(5)))
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()?;

        Ok(Self {
            client,
            primary_resource: config.primary_resource.clone(),
            fallback_resource: config.fallback_resource.clone(),
        })
    }

    /// 构建资源地址
    fn resource_url(target: &Target, resource: &str) -> std::result::Result<Url, ProbeError> {
        let invalid = |reason: String| ProbeError::InvalidAddress {
            url: target.url.clone(),
            reason,
        };

        let base = Url::parse(target.url.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", base.scheme())));
        }

        base.join(&format!("{}/rest/v1/{}", base.path().trim_end_matches('/'), resource))
            .map_err(|e| invalid(e.to_string()))
    }

    /// 执行一次计数 HEAD 请求
    async fn head_count(
        &self,
        target: &Target,
        resource: &str,
        limit_zero: bool,
    ) -> std::result::Result<CheckVerdict, ProbeError> {
        let mut url = Self::resource_url(target, resource)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            if limit_zero {
                query.append_pair("limit", "0");
            }
        }

        let response = self
            .client
            .head(url)
            .header("apikey", &target.api_key)
            .header("Authorization", format!("Bearer {}", target.api_key))
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| ProbeError::Transport(format_request_error(&e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(CheckVerdict::Passed)
        } else {
            Ok(CheckVerdict::Rejected {
                status: status.as_u16(),
                reason: describe_status(status),
            })
        }
    }
}

#[async_trait]
impl LivenessCheck for PostgrestCheck {
    async fn primary(&self, target: &Target) -> std::result::Result<CheckVerdict, ProbeError> {
        self.head_count(target, &self.primary_resource, false).await
    }

    async fn fallback(&self, target: &Target) -> std::result::Result<CheckVerdict, ProbeError> {
        self.head_count(target, &self.fallback_resource, true).await
    }
}

fn describe_status(status: StatusCode) -> String {
    format!(
        "HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    )
}

/// 格式化请求错误信息
///
/// 分类标签后附上完整的错误链，保留底层的原始错误文本。
fn format_request_error(error: &reqwest::Error) -> String {
    let mut chain = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }

    let lowered = chain.to_lowercase();
    let label = if error.is_timeout() {
        "Request timeout"
    } else if lowered.contains("dns error") || lowered.contains("failed to lookup address") {
        "DNS resolution failed"
    } else if lowered.contains("certificate") || lowered.contains("tls") {
        "SSL/TLS certificate error"
    } else if error.is_connect() {
        "Connection failed"
    } else {
        "Request failed"
    };

    format!("{}: {}", label, chain)
}
