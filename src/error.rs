//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use std::time::Duration;
use thiserror::Error;

/// DB Keepalive 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum KeepAliveError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 控制库（目标注册表）相关错误
    #[error("注册表错误: {0}")]
    Store(#[from] StoreError),

    /// 探测运行相关错误
    #[error("运行错误: {0}")]
    Run(#[from] RunError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP客户端错误
    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 控制库错误类型
///
/// 显示文本会直接出现在 HTTP 响应的 `details` 字段中。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 控制库地址或密钥未配置
    #[error("Missing control database configuration")]
    NotConfigured,

    /// 控制库不可达或返回了无法使用的响应
    #[error("{0}")]
    Unavailable(String),

    /// 写入 last_ping 失败
    #[error("failed to stamp target {target_id}: {reason}")]
    WriteFailed { target_id: String, reason: String },
}

/// 单个目标的探测错误
///
/// 仅表示传输层失败；目标应答了但资源不存在不属于错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// 目标地址无法解析
    #[error("Invalid target address {url}: {reason}")]
    InvalidAddress { url: String, reason: String },

    /// 探测超时
    #[error("probe timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// 网络或协议错误
    #[error("{0}")]
    Transport(String),
}

/// 运行级错误，只有这些会让一次运行整体失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// 凭证缺失或不匹配
    #[error("Unauthorized")]
    Unauthorized,

    /// 无法列出目标
    #[error("{0}")]
    StoreUnavailable(#[from] StoreError),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, KeepAliveError>;
