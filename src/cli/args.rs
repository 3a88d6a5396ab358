//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::config::get_default_config_path;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// DB Keepalive - 托管数据库保活服务
#[derive(Parser, Debug, Clone)]
#[command(
    name = "db-keepalive",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "KEEPALIVE_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的级别
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "KEEPALIVE_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 使用JSON格式输出日志
    #[arg(long, help = "使用JSON格式输出日志")]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

impl Args {
    /// 获取配置文件路径，未指定时使用默认路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(get_default_config_path)
    }
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 追踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动触发端点
    Serve {
        /// 监听地址
        #[arg(long, value_name = "ADDR", help = "监听地址")]
        bind: Option<String>,

        /// 监听端口
        #[arg(short, long, value_name = "PORT", help = "监听端口")]
        port: Option<u16>,

        /// 触发共享密钥
        #[arg(
            long,
            value_name = "SECRET",
            help = "触发共享密钥",
            env = "CRON_SECRET",
            hide_env_values = true
        )]
        cron_secret: Option<String>,

        /// 控制库地址
        #[arg(
            long,
            value_name = "URL",
            help = "控制库地址",
            env = "KEEPALIVE_CONTROL_URL"
        )]
        control_url: Option<String>,

        /// 控制库访问密钥
        #[arg(
            long,
            value_name = "KEY",
            help = "控制库访问密钥",
            env = "KEEPALIVE_CONTROL_KEY",
            hide_env_values = true
        )]
        control_key: Option<String>,
    },

    /// 手动触发一次运行
    Trigger {
        /// 运行中实例的地址
        #[arg(
            short,
            long,
            value_name = "URL",
            default_value = "http://127.0.0.1:3000",
            help = "运行中实例的地址"
        )]
        url: String,

        /// 触发共享密钥
        #[arg(
            long,
            value_name = "SECRET",
            help = "触发共享密钥",
            env = "CRON_SECRET",
            hide_env_values = true
        )]
        cron_secret: Option<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,

        /// 请求超时时间（秒）
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            default_value = "330",
            help = "请求超时时间（秒）"
        )]
        timeout: u64,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            default_value = "keepalive.toml",
            help = "配置文件路径"
        )]
        config_path: PathBuf,

        /// 覆盖已存在的文件
        #[arg(short, long, help = "覆盖已存在的文件")]
        force: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}
