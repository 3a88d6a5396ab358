//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{validate_config, Config, ConfigLoader, TomlConfigLoader, CONFIG_TEMPLATE};
use crate::error::{ConfigError, KeepAliveError, Result};
use crate::orchestrator::RunOrchestrator;
use crate::probe::ProbeStrategy;
use crate::registry::RestRegistry;
use crate::web::{WebAppState, WebServer, KEEP_ALIVE_PATH};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 加载配置
///
/// 显式指定的配置文件必须存在；默认路径下没有文件时使用默认配置。
pub async fn load_config(args: &Args) -> Result<Config> {
    let loader = TomlConfigLoader::new(true);
    match &args.config {
        Some(path) => loader.load_from_file(path).await,
        None => {
            let path = args.get_config_path();
            if path.exists() {
                loader.load_from_file(&path).await
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// 服务启动命令
pub struct ServeCommand {
    /// 已加载的配置
    pub config: Config,
}

#[async_trait]
impl Command for ServeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let mut config = self.config.clone();
        if let Commands::Serve {
            bind,
            port,
            cron_secret,
            control_url,
            control_key,
        } = &args.command
        {
            apply_serve_overrides(
                &mut config,
                bind.as_deref(),
                *port,
                cron_secret.as_deref(),
                control_url.as_deref(),
                control_key.as_deref(),
            );
        }
        validate_config(&config).map_err(ConfigError::ValidationError)?;

        self.serve(config).await
    }
}

impl ServeCommand {
    /// 组装依赖并运行 HTTP 服务，直到收到 Ctrl+C
    async fn serve(&self, config: Config) -> Result<()> {
        let registry = RestRegistry::new(&config.control)?;
        if !registry.is_configured() {
            warn!("控制库地址或密钥未配置，触发请求将返回配置错误");
        }
        if config.server.cron_secret.is_none() {
            warn!("未配置 CRON_SECRET，所有触发请求都会被拒绝");
        }

        let strategy = ProbeStrategy::from_config(&config.probe)?;
        let orchestrator =
            RunOrchestrator::new(Arc::new(registry), Arc::new(strategy), &config.probe);
        let state = WebAppState::new(Arc::new(orchestrator), config.server.cron_secret.clone());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("收到中断信号，正在停止服务...");
                    let _ = shutdown_tx.send(());
                }
                Err(err) => {
                    error!("监听中断信号失败: {}", err);
                }
            }
        });

        WebServer::new(config.server, state, shutdown_rx)
            .start()
            .await
    }
}

/// 将命令行和环境变量中的值覆盖到配置上
pub fn apply_serve_overrides(
    config: &mut Config,
    bind: Option<&str>,
    port: Option<u16>,
    cron_secret: Option<&str>,
    control_url: Option<&str>,
    control_key: Option<&str>,
) {
    if let Some(bind) = bind {
        config.server.bind_address = bind.to_string();
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(secret) = cron_secret {
        config.server.cron_secret = Some(secret.to_string());
    }
    if let Some(url) = control_url {
        config.control.url = Some(url.to_string());
    }
    if let Some(key) = control_key {
        config.control.api_key = Some(key.to_string());
    }
}

/// 手动触发命令
pub struct TriggerCommand {
    /// 已加载的配置，提供默认密钥
    pub config: Config,
}

#[async_trait]
impl Command for TriggerCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Trigger {
            url,
            cron_secret,
            format,
            timeout,
        } = &args.command
        {
            let secret = cron_secret
                .clone()
                .or_else(|| self.config.server.cron_secret.clone())
                .ok_or_else(|| {
                    ConfigError::ValidationError("未配置触发密钥 (CRON_SECRET)".to_string())
                })?;

            self.trigger(url, &secret, *format, Duration::from_secs(*timeout))
                .await
        } else {
            Ok(())
        }
    }
}

impl TriggerCommand {
    /// 调用运行中实例的触发端点
    async fn trigger(
        &self,
        base_url: &str,
        secret: &str,
        format: OutputFormat,
        timeout: Duration,
    ) -> Result<()> {
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), KEEP_ALIVE_PATH);
        info!("触发运行: {}", endpoint);

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let response = client
            .get(&endpoint)
            .bearer_auth(secret)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
            OutputFormat::Text => println!("{}", render_trigger_response(&body)),
        }

        if status.is_success() {
            Ok(())
        } else {
            Err(KeepAliveError::Other(anyhow::anyhow!(
                "触发失败: HTTP {}",
                status.as_u16()
            )))
        }
    }
}

/// 将触发端点的响应渲染为文本
pub fn render_trigger_response(body: &Value) -> String {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return match body.get("details").and_then(Value::as_str) {
            Some(details) => format!("✗ {}: {}", error, details),
            None => format!("✗ {}", error),
        };
    }

    let Some(summary) = body.get("summary") else {
        return body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
    };

    let success = summary.get("success").and_then(Value::as_u64).unwrap_or(0);
    let errors = summary.get("errors").and_then(Value::as_u64).unwrap_or(0);
    let mut lines = vec![format!("{} succeeded, {} failed", success, errors)];

    if let Some(results) = body.get("results").and_then(Value::as_array) {
        for result in results {
            let mark = match result.get("status").and_then(Value::as_str) {
                Some("success") => "✓",
                _ => "✗",
            };
            lines.push(format!(
                "  {} {} - {}",
                mark,
                result.get("project").and_then(Value::as_str).unwrap_or("?"),
                result.get("message").and_then(Value::as_str).unwrap_or("")
            ));
        }
    }

    lines.join("\n")
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            self.validate_config_file(&config_file, *verbose).await
        } else {
            Ok(())
        }
    }
}

impl ValidateCommand {
    /// 验证配置文件
    pub async fn validate_config_file(&self, config_path: &Path, verbose: bool) -> Result<()> {
        println!("验证配置文件: {}", config_path.display());

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(config_path).await?;

        println!("✓ 配置文件验证通过");
        if verbose {
            println!("服务配置:");
            println!(
                "  监听地址: {}:{}",
                config.server.bind_address, config.server.port
            );
            println!(
                "  触发密钥: {}",
                if config.server.cron_secret.is_some() { "已配置" } else { "未配置" }
            );
            println!("控制库配置:");
            println!(
                "  地址: {}",
                config.control.url.as_deref().unwrap_or("未配置")
            );
            println!("  表名: {}", config.control.table);
            println!("探测配置:");
            println!("  单目标超时: {}秒", config.probe.target_timeout_seconds);
            println!("  运行截止: {}秒", config.probe.run_timeout_seconds);
            println!("  最大并发: {}", config.probe.max_concurrent_probes);
            println!(
                "  检查资源: {} / {}",
                config.probe.primary_resource, config.probe.fallback_resource
            );
        }

        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件
    pub async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            return Err(ConfigError::ValidationError(format!(
                "配置文件已存在: {}，使用 --force 参数覆盖现有文件",
                config_path.display()
            ))
            .into());
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(config_path, CONFIG_TEMPLATE).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请设置 CRON_SECRET、KEEPALIVE_CONTROL_URL 和 KEEPALIVE_CONTROL_KEY 环境变量");

        Ok(())
    }
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}
