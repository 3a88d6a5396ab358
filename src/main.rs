//! DB Keepalive 主程序入口
//!
//! 托管数据库保活服务

use anyhow::{Context, Result};
use clap::Parser;
use db_keepalive::cli::args::{Args, Commands};
use db_keepalive::cli::commands::{
    load_config, Command, InitCommand, ServeCommand, TriggerCommand, ValidateCommand,
    VersionCommand,
};
use db_keepalive::config::Config;
use db_keepalive::logging::{LogConfig, LoggingSystem};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // serve 和 trigger 需要配置文件，其余命令不读取配置
    let config = match &args.command {
        Commands::Serve { .. } | Commands::Trigger { .. } => Some(
            load_config(&args)
                .await
                .with_context(|| format!("加载配置失败: {}", args.get_config_path().display()))?,
        ),
        _ => None,
    };

    // 初始化日志系统，命令行参数优先于配置文件
    let log_config = match (&args.log_level, &config) {
        (Some(level), config) => LogConfig {
            level: (*level).into(),
            json_format: args.json_logs || config.as_ref().is_some_and(|c| c.json_logs),
            ..Default::default()
        },
        (None, Some(config)) => {
            LogConfig::from_level_str(&config.log_level, args.json_logs || config.json_logs)
        }
        (None, None) => LogConfig {
            json_format: args.json_logs,
            ..Default::default()
        },
    };

    LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("DB Keepalive v{} 启动", db_keepalive::VERSION);

    // 执行命令
    if let Err(e) = execute_command(&args, config).await {
        error!("命令执行失败: {}", e);
        eprintln!("错误: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args, config: Option<Config>) -> Result<()> {
    let config = config.unwrap_or_default();
    let command: Box<dyn Command> = match &args.command {
        Commands::Serve { .. } => Box::new(ServeCommand { config }),
        Commands::Trigger { .. } => Box::new(TriggerCommand { config }),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::Init { .. } => Box::new(InitCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    command.execute(args).await.map_err(|e| anyhow::anyhow!(e))
}
