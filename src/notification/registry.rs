//! 订阅者注册表模块
//!
//! 提供活跃订阅者列表的查询和登记

use crate::config::types::{RegistryBackend, RegistryConfig};
use crate::error::RegistryError;
use crate::notification::model::RecipientId;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 订阅者登记后写入的值
const ACTIVE_MARKER: &str = "active";

/// 订阅者注册表trait
#[async_trait]
pub trait RecipientRegistry: Send + Sync {
    /// 列出当前所有活跃订阅者
    ///
    /// # 返回
    /// * `Result<Vec<RecipientId>, RegistryError>` - 订阅者快照
    async fn list_active_recipients(&self) -> Result<Vec<RecipientId>, RegistryError>;

    /// 登记订阅者
    ///
    /// # 返回
    /// * `Result<bool, RegistryError>` - 新登记返回 true，已是活跃订阅者返回 false
    async fn activate(&self, recipient: &RecipientId) -> Result<bool, RegistryError>;
}

/// 基于 Redis 的注册表，订阅者保存为 `<前缀><ID> = "active"`
#[derive(Clone)]
pub struct RedisRecipientRegistry {
    /// Redis 连接
    connection: ConnectionManager,
    /// 键前缀
    key_prefix: String,
}

impl RedisRecipientRegistry {
    /// 连接 Redis 并创建注册表
    ///
    /// # 参数
    /// * `redis_url` - Redis 连接地址
    /// * `key_prefix` - 订阅者键前缀
    pub async fn connect(redis_url: &str, key_prefix: &str) -> Result<Self, RegistryError> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("已连接订阅者注册表 Redis");

        Ok(Self {
            connection,
            key_prefix: key_prefix.to_string(),
        })
    }

    /// 订阅者对应的键
    fn key_for(&self, recipient: &RecipientId) -> String {
        format!("{}{}", self.key_prefix, recipient)
    }
}

/// 从键中取出订阅者ID
fn recipient_from_key(key: &str, prefix: &str) -> Option<RecipientId> {
    key.strip_prefix(prefix)
        .filter(|id| !id.is_empty())
        .map(RecipientId::from)
}

#[async_trait]
impl RecipientRegistry for RedisRecipientRegistry {
    async fn list_active_recipients(&self) -> Result<Vec<RecipientId>, RegistryError> {
        let mut connection = self.connection.clone();
        let pattern = format!("{}*", self.key_prefix);
        let keys: Vec<String> = connection.keys(&pattern).await?;

        let recipients: Vec<RecipientId> = keys
            .iter()
            .filter_map(|key| recipient_from_key(key, &self.key_prefix))
            .collect();

        debug!("从 Redis 读取到 {} 个订阅者", recipients.len());
        Ok(recipients)
    }

    async fn activate(&self, recipient: &RecipientId) -> Result<bool, RegistryError> {
        let mut connection = self.connection.clone();
        let key = self.key_for(recipient);

        let current: Option<String> = connection.get(&key).await?;
        if current.as_deref() == Some(ACTIVE_MARKER) {
            return Ok(false);
        }

        connection.set::<_, _, ()>(&key, ACTIVE_MARKER).await?;
        info!("新订阅者已登记: {}", recipient);
        Ok(true)
    }
}

/// 内存注册表，保持登记顺序
#[derive(Debug, Default)]
pub struct StaticRecipientRegistry {
    /// 订阅者列表
    recipients: RwLock<Vec<RecipientId>>,
}

impl StaticRecipientRegistry {
    /// 使用初始订阅者创建注册表，重复ID只保留第一次
    pub fn new<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RecipientId>,
    {
        let mut unique: Vec<RecipientId> = Vec::new();
        for recipient in recipients {
            let recipient = recipient.into();
            if !unique.contains(&recipient) {
                unique.push(recipient);
            }
        }

        Self {
            recipients: RwLock::new(unique),
        }
    }
}

#[async_trait]
impl RecipientRegistry for StaticRecipientRegistry {
    async fn list_active_recipients(&self) -> Result<Vec<RecipientId>, RegistryError> {
        Ok(self.recipients.read().await.clone())
    }

    async fn activate(&self, recipient: &RecipientId) -> Result<bool, RegistryError> {
        let mut recipients = self.recipients.write().await;
        if recipients.contains(recipient) {
            return Ok(false);
        }
        recipients.push(recipient.clone());
        info!("新订阅者已登记: {}", recipient);
        Ok(true)
    }
}

/// 根据配置创建注册表
pub async fn create_registry(
    config: &RegistryConfig,
) -> Result<Arc<dyn RecipientRegistry>, RegistryError> {
    match config.backend {
        RegistryBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                RegistryError::Unavailable("未配置 redis_url".to_string())
            })?;
            let registry = RedisRecipientRegistry::connect(url, &config.key_prefix).await?;
            Ok(Arc::new(registry))
        }
        RegistryBackend::Static => Ok(Arc::new(StaticRecipientRegistry::new(
            config.recipients.iter().map(String::as_str),
        ))),
    }
}
