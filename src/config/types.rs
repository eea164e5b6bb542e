//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use serde::{Deserialize, Serialize};

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// Telegram 机器人配置
    pub telegram: TelegramConfig,
    /// 发送限流配置
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// 分发配置
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// 订阅者注册表配置
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Web 服务器配置
    #[serde(default)]
    pub web: WebConfig,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 是否输出JSON格式日志
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

/// Telegram 机器人配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramConfig {
    /// 机器人令牌
    pub bot_token: String,
    /// Bot API 地址
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// 是否轮询机器人更新（处理 /start 订阅命令）
    #[serde(default = "default_poll_updates")]
    pub poll_updates: bool,
    /// getUpdates 长轮询超时（秒）
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: default_api_base_url(),
            request_timeout_seconds: default_request_timeout(),
            poll_updates: default_poll_updates(),
            poll_timeout_seconds: default_poll_timeout(),
        }
    }
}

/// 发送限流配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// 每个窗口内允许的最大发送次数
    #[serde(default = "default_max_sends")]
    pub max_sends: usize,
    /// 窗口长度（毫秒）
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_sends: default_max_sends(),
            window_ms: default_window_ms(),
        }
    }
}

/// 图片结果的发送方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlbumMode {
    /// 相册内每条结果单独发送一张图片
    #[default]
    Individual,
    /// 每个相册一次 sendMediaGroup 调用
    Grouped,
}

/// 分发配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// 字段值最大显示长度（字符）
    #[serde(default = "default_max_field_length")]
    pub max_field_length: usize,
    /// 单个相册的最大图片数
    #[serde(default = "default_album_size")]
    pub album_size: usize,
    /// 图片结果的发送方式
    #[serde(default)]
    pub album_mode: AlbumMode,
    /// 同时投递的最大用户数
    #[serde(default = "default_max_concurrent_recipients")]
    pub max_concurrent_recipients: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_field_length: default_max_field_length(),
            album_size: default_album_size(),
            album_mode: AlbumMode::default(),
            max_concurrent_recipients: default_max_concurrent_recipients(),
        }
    }
}

/// 注册表后端类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    /// Redis 键值存储
    #[default]
    Redis,
    /// 配置文件中的固定列表
    Static,
}

/// 订阅者注册表配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfig {
    /// 后端类型
    #[serde(default)]
    pub backend: RegistryBackend,
    /// Redis 连接地址
    pub redis_url: Option<String>,
    /// 订阅者键前缀
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// 固定订阅者列表（static 后端）
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::default(),
            redis_url: None,
            key_prefix: default_key_prefix(),
            recipients: Vec::new(),
        }
    }
}

/// Web 服务器配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 绑定地址
    #[serde(default = "default_web_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: default_web_bind_address(),
            port: default_web_port(),
        }
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}
fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_poll_updates() -> bool {
    true
}
fn default_poll_timeout() -> u64 {
    30
}
fn default_max_sends() -> usize {
    20
}
fn default_window_ms() -> u64 {
    1000
}
fn default_max_field_length() -> usize {
    100
}
fn default_album_size() -> usize {
    10
}
fn default_max_concurrent_recipients() -> usize {
    1
}
fn default_key_prefix() -> String {
    "user:".to_string()
}
fn default_web_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_web_port() -> u16 {
    5005
}

/// Telegram 单次相册的图片上限
pub const MAX_ALBUM_SIZE: usize = 10;

/// 限流窗口长度上限（毫秒，一天）
pub const MAX_RATE_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Telegram 单次相册的图片下限
pub const MIN_ALBUM_SIZE: usize = 2;

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证日志级别
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.global.log_level, valid_log_levels
        ));
    }

    // 验证 Telegram 配置
    if config.telegram.bot_token.trim().is_empty() {
        return Err("Telegram 机器人令牌不能为空".to_string());
    }

    let base_url = &config.telegram.api_base_url;
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(format!("Bot API 地址格式无效: {}", base_url));
    }

    if config.telegram.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    // 验证限流配置
    if config.rate_limit.max_sends == 0 {
        return Err("限流窗口内的最大发送次数不能为0".to_string());
    }

    if config.rate_limit.window_ms == 0 {
        return Err("限流窗口长度不能为0".to_string());
    }

    if config.rate_limit.window_ms > MAX_RATE_WINDOW_MS {
        return Err(format!(
            "限流窗口长度 {}ms 超过上限 {}ms",
            config.rate_limit.window_ms, MAX_RATE_WINDOW_MS
        ));
    }

    // 验证分发配置
    if config.dispatch.max_field_length == 0 {
        return Err("字段最大显示长度不能为0".to_string());
    }

    if !(1..=MAX_ALBUM_SIZE).contains(&config.dispatch.album_size) {
        return Err(format!(
            "相册大小 {} 无效，必须在 1 到 {} 之间",
            config.dispatch.album_size, MAX_ALBUM_SIZE
        ));
    }

    if config.dispatch.max_concurrent_recipients == 0 {
        return Err("最大并发用户数不能为0".to_string());
    }

    // 验证注册表配置
    match config.registry.backend {
        RegistryBackend::Redis => {
            let url = config.registry.redis_url.as_deref().unwrap_or_default();
            if url.trim().is_empty() {
                return Err("Redis 注册表必须配置 redis_url".to_string());
            }
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(format!("Redis 地址格式无效: {}", url));
            }
        }
        RegistryBackend::Static => {
            if config
                .registry
                .recipients
                .iter()
                .any(|recipient| recipient.trim().is_empty())
            {
                return Err("订阅者列表中存在空的用户ID".to_string());
            }
        }
    }

    if config.registry.key_prefix.is_empty() {
        return Err("订阅者键前缀不能为空".to_string());
    }

    // 验证Web配置
    if config.web.port == 0 {
        return Err(format!(
            "无效的Web服务器端口: {}，端口不能为0",
            config.web.port
        ));
    }

    if config.web.bind_address.is_empty() {
        return Err("Web服务器绑定地址不能为空".to_string());
    }

    Ok(())
}
