//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

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
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
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
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中 `${VAR_NAME}` 格式的环境变量
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut missing = None;
        let result = env_var_regex.replace_all(content, |captures: &regex::Captures| {
            let var_name = &captures[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    missing.get_or_insert_with(|| var_name.to_string());
                    String::new()
                }
            }
        });

        if let Some(var) = missing {
            return Err(ConfigError::EnvVarError { var }.into());
        }

        Ok(result.into_owned())
    }

    /// 解析TOML内容
    fn parse_toml(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;

        Ok(config)
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

        info!("成功加载配置文件: {}", path.display());

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 当前目录存在 config.toml 时优先使用，否则使用用户配置目录下的
/// `scrape-notify/config.toml`
pub fn get_default_config_path() -> PathBuf {
    let local = PathBuf::from("config.toml");
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("scrape-notify").join("config.toml"))
        .unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::RegistryBackend;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    const TEST_CONFIG_TOML: &str = r#"
[global]
log_level = "debug"

[telegram]
bot_token = "123456:abc"
poll_updates = false

[rate_limit]
max_sends = 5
window_ms = 250

[registry]
backend = "static"
recipients = ["42", "43"]
"#;

    const TEST_CONFIG_WITH_ENV_VARS: &str = r#"
[telegram]
bot_token = "${SCRAPE_NOTIFY_TEST_TOKEN}"

[registry]
backend = "redis"
redis_url = "${SCRAPE_NOTIFY_TEST_REDIS}"
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.global.log_level, "debug");
        assert_eq!(config.telegram.bot_token, "123456:abc");
        assert!(!config.telegram.poll_updates);
        assert_eq!(config.rate_limit.max_sends, 5);
        assert_eq!(config.rate_limit.window_ms, 250);
        assert_eq!(config.registry.backend, RegistryBackend::Static);
        assert_eq!(config.registry.recipients, vec!["42", "43"]);
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution() {
        env::set_var("SCRAPE_NOTIFY_TEST_TOKEN", "999:secret");
        env::set_var("SCRAPE_NOTIFY_TEST_REDIS", "redis://localhost:6379");

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_string(TEST_CONFIG_WITH_ENV_VARS)
            .await
            .unwrap();

        assert_eq!(config.telegram.bot_token, "999:secret");
        assert_eq!(
            config.registry.redis_url.as_deref(),
            Some("redis://localhost:6379")
        );

        env::remove_var("SCRAPE_NOTIFY_TEST_TOKEN");
        env::remove_var("SCRAPE_NOTIFY_TEST_REDIS");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution_missing_var() {
        env::remove_var("SCRAPE_NOTIFY_MISSING_VAR");
        let content = r#"
[telegram]
bot_token = "${SCRAPE_NOTIFY_MISSING_VAR}"
"#;

        let loader = TomlConfigLoader::new(true);
        let result = loader.load_from_string(content).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("SCRAPE_NOTIFY_MISSING_VAR"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEST_CONFIG_TOML.as_bytes()).unwrap();

        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_file(file.path()).await.unwrap();
        assert_eq!(config.registry.recipients.len(), 2);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = TomlConfigLoader::new(false);
        let result = loader.load_from_file("/nonexistent/scrape-notify.toml").await;

        assert!(result.unwrap_err().to_string().contains("配置文件不存在"));
    }

    #[tokio::test]
    async fn test_validation_error_is_reported() {
        let loader = TomlConfigLoader::new(false);
        let result = loader
            .load_from_string(
                r#"
[telegram]
bot_token = "abc"

[registry]
backend = "redis"
"#,
            )
            .await;

        assert!(result.unwrap_err().to_string().contains("配置验证失败"));
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new(false);
        let content = "test ${VAR} content";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
