//! 机器人更新轮询
//!
//! 长轮询拉取机器人收到的消息，处理 `/start` 订阅命令

use crate::error::{RegistryError, TransportError};
use crate::logging::LoggingSystem;
use crate::notification::model::RecipientId;
use crate::notification::rate_limiter::RateLimiter;
use crate::notification::registry::RecipientRegistry;
use crate::notification::telegram::{Message, TelegramTransport, Update};
use crate::notification::transport::{MessageTransport, TextOptions};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// 订阅命令
const START_COMMAND: &str = "/start";

/// 拉取失败后的等待时间
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// 更新来源trait
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// 拉取 `offset` 之后的更新
    ///
    /// # 参数
    /// * `offset` - 起始更新序号
    /// * `timeout_secs` - 长轮询等待时间（秒）
    async fn fetch_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError>;
}

#[async_trait]
impl UpdateSource for TelegramTransport {
    async fn fetch_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        self.get_updates(offset, timeout_secs).await
    }
}

/// `/start` 命令的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// 新订阅
    Registered,
    /// 已经是活跃订阅者
    AlreadyActive,
    /// 消息中没有发送者
    MissingSender,
}

impl StartOutcome {
    /// 回复给用户的文本
    pub fn reply(&self) -> &'static str {
        match self {
            StartOutcome::Registered => "You are now active",
            StartOutcome::AlreadyActive => "You are already active",
            StartOutcome::MissingSender => "Error: User ID not found",
        }
    }
}

/// 判断消息是否为 `/start` 命令，允许 `/start@bot_name` 和命令参数
fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    command == START_COMMAND
}

/// 机器人更新轮询器
pub struct UpdatePoller {
    /// 更新来源
    source: Arc<dyn UpdateSource>,
    /// 回复通道
    transport: Arc<dyn MessageTransport>,
    /// 订阅者注册表
    registry: Arc<dyn RecipientRegistry>,
    /// 全局限流器，回复与通知共用
    limiter: Arc<RateLimiter>,
    /// 长轮询等待时间（秒）
    poll_timeout_secs: u64,
    /// 拉取失败后的等待时间
    retry_delay: Duration,
    /// 下一次拉取的起始序号
    offset: Option<i64>,
}

impl UpdatePoller {
    /// 创建轮询器
    pub fn new(
        source: Arc<dyn UpdateSource>,
        transport: Arc<dyn MessageTransport>,
        registry: Arc<dyn RecipientRegistry>,
        limiter: Arc<RateLimiter>,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            source,
            transport,
            registry,
            limiter,
            poll_timeout_secs,
            retry_delay: DEFAULT_RETRY_DELAY,
            offset: None,
        }
    }

    /// 设置拉取失败后的等待时间
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// 运行轮询循环，直到收到关闭信号
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("机器人更新轮询已启动");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，停止更新轮询");
                    break;
                }
                polled = self.poll_once() => {
                    if let Err(e) = polled {
                        warn!("拉取机器人更新失败: {}，{}秒后重试", e, self.retry_delay.as_secs());
                        tokio::select! {
                            _ = shutdown_rx.recv() => break,
                            _ = tokio::time::sleep(self.retry_delay) => {}
                        }
                    }
                }
            }
        }
    }

    /// 拉取并处理一批更新
    ///
    /// # 返回
    /// * `Result<usize, TransportError>` - 处理的更新数
    pub async fn poll_once(&mut self) -> Result<usize, TransportError> {
        let updates = self
            .source
            .fetch_updates(self.offset, self.poll_timeout_secs)
            .await?;

        for update in &updates {
            self.offset = Some(self.offset.unwrap_or(i64::MIN).max(update.update_id + 1));
            self.handle_update(update).await;
        }

        if !updates.is_empty() {
            debug!("处理了 {} 条机器人更新", updates.len());
        }
        Ok(updates.len())
    }

    /// 处理单条更新
    ///
    /// # 返回
    /// * `Option<StartOutcome>` - 是 `/start` 命令时返回处理结果
    pub async fn handle_update(&self, update: &Update) -> Option<StartOutcome> {
        if update.chat_member.is_some() {
            debug!("收到群成员变化事件: {}", update.update_id);
        }

        let message = update.message.as_ref()?;
        let text = message.text.as_deref()?;
        if !is_start_command(text) {
            return None;
        }

        let outcome = match self.register_sender(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("登记订阅者失败: {}", e);
                return None;
            }
        };

        self.reply(message, outcome.reply()).await;
        Some(outcome)
    }

    /// 登记消息发送者
    async fn register_sender(&self, message: &Message) -> Result<StartOutcome, RegistryError> {
        let Some(user) = message.from.as_ref() else {
            return Ok(StartOutcome::MissingSender);
        };

        let recipient = RecipientId::new(user.id.to_string());
        if self.registry.activate(&recipient).await? {
            info!(
                "用户 {} ({}) 已订阅通知",
                recipient,
                user.username.as_deref().unwrap_or("-")
            );
            Ok(StartOutcome::Registered)
        } else {
            Ok(StartOutcome::AlreadyActive)
        }
    }

    /// 在消息所在会话中回复
    async fn reply(&self, message: &Message, text: &str) {
        let chat = RecipientId::new(message.chat.id.to_string());

        self.limiter.acquire().await;
        match self
            .transport
            .send_text(&chat, text, TextOptions::plain())
            .await
        {
            Ok(()) => LoggingSystem::delivery_log("reply", chat.as_str(), true, None),
            Err(e) => {
                warn!("回复用户 {} 失败: {}", chat, e);
                LoggingSystem::delivery_log("reply", chat.as_str(), false, Some(&e.to_string()));
            }
        }
    }
}
