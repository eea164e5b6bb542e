//! Telegram 消息发送器模块
//!
//! 通过 Bot API 的 HTTP 接口实现消息发送和更新拉取

use crate::config::types::{TelegramConfig, MAX_ALBUM_SIZE, MIN_ALBUM_SIZE};
use crate::error::TransportError;
use crate::notification::model::RecipientId;
use crate::notification::transport::{AlbumItem, MessageTransport, PhotoOptions, TextOptions};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

/// Bot API 统一响应结构
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

/// 机器人收到的一条更新
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// 更新序号
    pub update_id: i64,
    /// 普通消息
    #[serde(default)]
    pub message: Option<Message>,
    /// 群成员变化事件
    #[serde(default)]
    pub chat_member: Option<Value>,
}

/// 聊天消息
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// 消息ID
    pub message_id: i64,
    /// 发送者
    #[serde(default)]
    pub from: Option<User>,
    /// 所在会话
    pub chat: Chat,
    /// 文本内容
    #[serde(default)]
    pub text: Option<String>,
}

/// Telegram 用户
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// 用户ID
    pub id: i64,
    /// 用户名
    #[serde(default)]
    pub username: Option<String>,
}

/// Telegram 会话
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// 会话ID
    pub id: i64,
}

/// Telegram 消息发送器
pub struct TelegramTransport {
    /// HTTP客户端
    client: Client,
    /// Bot API 地址
    api_base_url: String,
    /// 机器人令牌
    bot_token: String,
}

impl TelegramTransport {
    /// 创建新的 Telegram 发送器
    ///
    /// # 参数
    /// * `api_base_url` - Bot API 地址
    /// * `bot_token` - 机器人令牌
    /// * `timeout` - 单次请求超时
    ///
    /// # 返回
    /// * `Result<Self>` - 发送器实例
    pub fn new(api_base_url: &str, bot_token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("创建HTTP客户端失败")?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    /// 根据配置创建发送器
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            &config.bot_token,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    /// 拼接接口地址
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.bot_token, method)
    }

    /// 调用 Bot API 方法
    ///
    /// 日志只记录方法名，不记录包含令牌的地址
    async fn call(
        &self,
        method: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<Value, TransportError> {
        debug!("调用 Telegram 接口: {}", method);

        let mut request = self.client.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // reqwest 错误带有请求地址，地址中包含令牌
        let response = request.send().await.map_err(|e| e.without_url())?;
        let status = response.status();
        let text = response.text().await.map_err(|e| e.without_url())?;

        match serde_json::from_str::<ApiResponse>(&text) {
            Ok(parsed) if parsed.ok => Ok(parsed.result),
            Ok(parsed) => {
                let err = TransportError::Api {
                    method: method.to_string(),
                    code: parsed.error_code.unwrap_or(i64::from(status.as_u16())),
                    description: parsed.description.unwrap_or_default(),
                };
                error!("Telegram 接口调用失败: {}", err);
                Err(err)
            }
            Err(_) => {
                let err = TransportError::Api {
                    method: method.to_string(),
                    code: i64::from(status.as_u16()),
                    description: text.chars().take(200).collect(),
                };
                error!("Telegram 接口返回了无法解析的响应: {}", err);
                Err(err)
            }
        }
    }

    /// 获取机器人信息，用于验证令牌
    pub async fn get_me(&self) -> Result<User, TransportError> {
        let result = self.call("getMe", &json!({}), None).await?;
        serde_json::from_value(result)
            .map_err(|e| TransportError::InvalidPayload(format!("getMe 响应格式错误: {}", e)))
    }

    /// 长轮询拉取更新
    ///
    /// # 参数
    /// * `offset` - 起始更新序号
    /// * `timeout_secs` - 长轮询等待时间（秒）
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "chat_member"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        // 请求超时要长于服务端的长轮询等待时间
        let request_timeout = Duration::from_secs(timeout_secs + 10);
        let result = self.call("getUpdates", &body, Some(request_timeout)).await?;
        serde_json::from_value(result)
            .map_err(|e| TransportError::InvalidPayload(format!("getUpdates 响应格式错误: {}", e)))
    }
}

/// 构建 sendMessage 请求体
fn build_text_body(recipient: &RecipientId, text: &str, options: TextOptions) -> Value {
    let mut body = json!({
        "chat_id": recipient.as_str(),
        "text": text,
    });
    if options.rich_markup {
        body["parse_mode"] = json!("HTML");
    }
    if options.suppress_link_preview {
        body["disable_web_page_preview"] = json!(true);
    }
    body
}

/// 构建 sendPhoto 请求体
fn build_photo_body(recipient: &RecipientId, image_url: &str, options: &PhotoOptions) -> Value {
    let mut body = json!({
        "chat_id": recipient.as_str(),
        "photo": image_url,
        "caption": options.caption,
    });
    if options.rich_markup {
        body["parse_mode"] = json!("HTML");
    }
    body
}

/// 构建 sendMediaGroup 请求体
fn build_album_body(recipient: &RecipientId, items: &[AlbumItem]) -> Value {
    let media: Vec<Value> = items
        .iter()
        .map(|item| {
            let mut media = json!({
                "type": "photo",
                "media": item.image_url,
                "caption": item.caption,
            });
            if item.rich_markup {
                media["parse_mode"] = json!("HTML");
            }
            media
        })
        .collect();

    json!({
        "chat_id": recipient.as_str(),
        "media": media,
    })
}

#[async_trait]
impl MessageTransport for TelegramTransport {
    async fn send_text(
        &self,
        recipient: &RecipientId,
        text: &str,
        options: TextOptions,
    ) -> Result<(), TransportError> {
        let body = build_text_body(recipient, text, options);
        self.call("sendMessage", &body, None).await.map(|_| ())
    }

    async fn send_photo(
        &self,
        recipient: &RecipientId,
        image_url: &str,
        options: &PhotoOptions,
    ) -> Result<(), TransportError> {
        let body = build_photo_body(recipient, image_url, options);
        self.call("sendPhoto", &body, None).await.map(|_| ())
    }

    async fn send_album(
        &self,
        recipient: &RecipientId,
        items: &[AlbumItem],
    ) -> Result<(), TransportError> {
        if items.len() < MIN_ALBUM_SIZE || items.len() > MAX_ALBUM_SIZE {
            return Err(TransportError::InvalidPayload(format!(
                "相册图片数 {} 无效，必须在 {} 到 {} 之间",
                items.len(),
                MIN_ALBUM_SIZE,
                MAX_ALBUM_SIZE
            )));
        }

        let body = build_album_body(recipient, items);
        self.call("sendMediaGroup", &body, None).await.map(|_| ())
    }
}
