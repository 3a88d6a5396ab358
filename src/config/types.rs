//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// 主配置结构
///
/// 启动时构造一次，之后以引用形式传给各组件的构造函数。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 是否输出JSON格式日志
    #[serde(default)]
    pub json_logs: bool,
    /// HTTP 入口配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 控制库配置
    #[serde(default)]
    pub control: ControlStoreConfig,
    /// 探测配置
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// HTTP 入口配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 触发探测所需的共享密钥，未设置时所有请求都会被拒绝
    pub cron_secret: Option<String>,
}

/// 控制库（目标注册表）配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlStoreConfig {
    /// 控制库基础地址
    pub url: Option<String>,
    /// 控制库访问密钥
    pub api_key: Option<String>,
    /// 存放目标的表名
    #[serde(default = "default_table")]
    pub table: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_control_timeout")]
    pub request_timeout_seconds: u64,
}

/// 探测配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// 单个目标的探测超时（秒），覆盖主检查和回退检查
    #[serde(default = "default_target_timeout")]
    pub target_timeout_seconds: u64,
    /// 整次运行的截止时间（秒）
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,
    /// 最大并发探测数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_probes: usize,
    /// 主检查使用的资源
    #[serde(default = "default_primary_resource")]
    pub primary_resource: String,
    /// 回退检查使用的资源
    #[serde(default = "default_fallback_resource")]
    pub fallback_resource: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            server: ServerConfig::default(),
            control: ControlStoreConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cron_secret: None,
        }
    }
}

impl Default for ControlStoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: default_table(),
            request_timeout_seconds: default_control_timeout(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_timeout_seconds: default_target_timeout(),
            run_timeout_seconds: default_run_timeout(),
            max_concurrent_probes: default_max_concurrent(),
            primary_resource: default_primary_resource(),
            fallback_resource: default_fallback_resource(),
        }
    }
}

impl ServerConfig {
    /// 解析监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| format!("无效的监听地址 {}:{}: {}", self.bind_address, self.port, e))
    }
}

impl ProbeConfig {
    /// 单个目标的探测超时
    pub fn target_timeout(&self) -> Duration {
        Duration::from_secs(self.target_timeout_seconds)
    }

    /// 整次运行的截止时间
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_table() -> String {
    "projects".to_string()
}
fn default_control_timeout() -> u64 {
    10
}
fn default_target_timeout() -> u64 {
    10
}
fn default_run_timeout() -> u64 {
    300
}
fn default_max_concurrent() -> usize {
    4
}
fn default_primary_resource() -> String {
    "projects".to_string()
}
fn default_fallback_resource() -> String {
    "_realtime".to_string()
}

/// 配置验证函数
///
/// 控制库地址与共享密钥允许缺省：缺省时由运行时以错误响应拒绝请求，而不是阻止启动。
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.log_level, valid_log_levels
        ));
    }

    if config.server.port == 0 {
        return Err("端口不能为0".to_string());
    }
    if config.server.bind_address.trim().is_empty() {
        return Err("绑定地址不能为空".to_string());
    }
    if let Some(secret) = &config.server.cron_secret {
        if secret.trim().is_empty() {
            return Err("cron_secret 不能为空字符串".to_string());
        }
    }

    if let Some(url) = &config.control.url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("控制库URL格式无效: {}", url));
        }
    }
    if config.control.table.trim().is_empty() {
        return Err("控制库表名不能为空".to_string());
    }
    if config.control.request_timeout_seconds == 0 {
        return Err("控制库请求超时时间不能为0".to_string());
    }

    let probe = &config.probe;
    if probe.target_timeout_seconds == 0 {
        return Err("单目标探测超时不能为0".to_string());
    }
    if probe.run_timeout_seconds < probe.target_timeout_seconds {
        return Err("运行截止时间不能小于单目标探测超时".to_string());
    }
    if probe.max_concurrent_probes == 0 {
        return Err("最大并发探测数不能为0".to_string());
    }
    if probe.primary_resource.trim().is_empty() || probe.fallback_resource.trim().is_empty() {
        return Err("探测资源名不能为空".to_string());
    }

    Ok(())
}
