//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Scrape Notify 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum ScrapeNotifyError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 消息通道相关错误
    #[error("消息发送错误: {0}")]
    Transport(#[from] TransportError),

    /// 订阅者注册表相关错误
    #[error("订阅者注册表错误: {0}")]
    Registry(#[from] RegistryError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

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

/// 消息通道错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP请求错误
    #[error("HTTP请求失败: {0}")]
    Request(#[from] reqwest::Error),

    /// 平台返回 ok=false
    #[error("{method} 调用被拒绝: [{code}] {description}")]
    Api {
        method: String,
        code: i64,
        description: String,
    },

    /// 本地检查不通过的请求内容
    #[error("无效的消息内容: {0}")]
    InvalidPayload(String),
}

/// 订阅者注册表错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Redis错误
    #[error("Redis操作失败: {0}")]
    Redis(#[from] redis::RedisError),

    /// 注册表不可用
    #[error("注册表不可用: {0}")]
    Unavailable(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ScrapeNotifyError>;
