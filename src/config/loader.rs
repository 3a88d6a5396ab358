//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config>;

    /// 从字符串加载配置
    ///
    /// # 参数
    /// * `content` - 配置文件内容
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置，失败时返回描述性的校验错误
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用 `${VAR}` 环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 展开配置内容中的 `${VAR}` 占位符
    ///
    /// 按出现顺序单遍扫描，占位符之间的原文原样保留。变量值本身不会再次展开。
    ///
    /// # 参数
    /// * `content` - 原始配置内容
    ///
    /// # 返回
    /// * `Result<String>` - 展开后的内容；首个未设置的变量返回 `ConfigError::EnvVarError`
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        let placeholder = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut expanded = String::with_capacity(content.len());
        let mut cursor = 0;
        for captures in placeholder.captures_iter(content) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let value = std::env::var(name.as_str()).map_err(|_| ConfigError::EnvVarError {
                var: name.as_str().to_string(),
            })?;

            expanded.push_str(&content[cursor..whole.start()]);
            expanded.push_str(&value);
            cursor = whole.end();
        }
        expanded.push_str(&content[cursor..]);

        Ok(expanded)
    }

    /// 解析TOML内容
    ///
    /// # 参数
    /// * `content` - TOML内容，解析前先展开环境变量
    ///
    /// # 返回
    /// * `Result<Config>` - 解析的配置或错误
    fn parse_toml(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)).into())
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        log::info!("成功加载配置文件: {}", path.display());

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 当前目录存在 `keepalive.toml` 时优先使用，否则落到平台配置目录。
pub fn get_default_config_path() -> PathBuf {
    if Path::new("keepalive.toml").exists() {
        return PathBuf::from("keepalive.toml");
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("db-keepalive").join("keepalive.toml"))
        .unwrap_or_else(|| PathBuf::from("keepalive.toml"))
}

/// 最小配置模板，`init` 命令写出的内容
pub const CONFIG_TEMPLATE: &str = r#"# db-keepalive 配置文件
log_level = "info"
json_logs = false

[server]
bind_address = "127.0.0.1"
port = 3000
cron_secret = "${CRON_SECRET}"

[control]
url = "${KEEPALIVE_CONTROL_URL}"
api_key = "${KEEPALIVE_CONTROL_KEY}"
table = "projects"
request_timeout_seconds = 10

[probe]
target_timeout_seconds = 10
run_timeout_seconds = 300
max_concurrent_probes = 4
primary_resource = "projects"
fallback_resource = "_realtime"
"#;
