//! 投递单元模块
//!
//! 把一个分组投递给一个订阅者：带图片的结果逐条发送图片，失败时降级为文本；
//! 无图片的结果合并成一条文本消息。任何一次发送失败都只记录日志，不向上传播。

use crate::config::types::{AlbumMode, DispatchConfig, MIN_ALBUM_SIZE};
use crate::error::TransportError;
use crate::logging::LoggingSystem;
use crate::notification::format::{
    format_item, format_photo_caption, format_text_block, truncate, visible_length,
    DEFAULT_MAX_FIELD_LENGTH,
};
use crate::notification::grouper::{split_into_albums, DEFAULT_ALBUM_SIZE};
use crate::notification::model::{Chunk, RecipientId, ResultItem};
use crate::notification::rate_limiter::RateLimiter;
use crate::notification::transport::{AlbumItem, MessageTransport, PhotoOptions, TextOptions};
use serde::Serialize;
use std::ops::AddAssign;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Telegram 图片说明的最大长度（字符）
pub const MAX_CAPTION_LENGTH: usize = 1024;

/// 日志中展示的消息内容最大长度
const LOGGED_PAYLOAD_LENGTH: usize = 200;

/// 投递选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// 字段值最大显示长度
    pub max_field_length: usize,
    /// 单个相册最大图片数
    pub album_size: usize,
    /// 图片结果的发送方式
    pub album_mode: AlbumMode,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
            album_size: DEFAULT_ALBUM_SIZE,
            album_mode: AlbumMode::Individual,
        }
    }
}

impl From<&DispatchConfig> for DeliveryOptions {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_field_length: config.max_field_length,
            album_size: config.album_size,
            album_mode: config.album_mode,
        }
    }
}

/// 投递统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// 尝试投递的结果数
    pub attempted_items: usize,
    /// 以图片形式送达的结果数
    pub rich_delivered: usize,
    /// 图片失败后以文本送达的结果数
    pub fallback_delivered: usize,
    /// 合并文本消息送达的结果数
    pub text_delivered: usize,
    /// 放弃投递的结果数
    pub abandoned: usize,
    /// 实际发起的发送调用次数
    pub send_calls: usize,
}

impl DeliveryReport {
    /// 送达的结果数
    pub fn delivered(&self) -> usize {
        self.rich_delivered + self.fallback_delivered + self.text_delivered
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Rich => self.rich_delivered += 1,
            ItemOutcome::Fallback => self.fallback_delivered += 1,
            ItemOutcome::Abandoned => self.abandoned += 1,
        }
    }
}

impl AddAssign for DeliveryReport {
    fn add_assign(&mut self, other: Self) {
        self.attempted_items += other.attempted_items;
        self.rich_delivered += other.rich_delivered;
        self.fallback_delivered += other.fallback_delivered;
        self.text_delivered += other.text_delivered;
        self.abandoned += other.abandoned;
        self.send_calls += other.send_calls;
    }
}

/// 单条图片结果的投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Rich,
    Fallback,
    Abandoned,
}

/// 准备好的图片结果
struct PhotoItem<'a> {
    item: &'a ResultItem,
    image_url: &'a str,
    caption: String,
}

impl PhotoItem<'_> {
    /// 说明文字解析后是否超过平台上限
    fn caption_too_long(&self) -> bool {
        visible_length(&self.caption) > MAX_CAPTION_LENGTH
    }
}

/// 投递单元
pub struct DeliveryUnit {
    /// 消息通道
    transport: Arc<dyn MessageTransport>,
    /// 全局限流器
    limiter: Arc<RateLimiter>,
    /// 投递选项
    options: DeliveryOptions,
}

impl DeliveryUnit {
    /// 创建投递单元
    ///
    /// # 参数
    /// * `transport` - 消息通道
    /// * `limiter` - 全局限流器，所有发送都经过它
    /// * `options` - 投递选项
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        limiter: Arc<RateLimiter>,
        options: DeliveryOptions,
    ) -> Self {
        Self {
            transport,
            limiter,
            options,
        }
    }

    /// 把一个分组投递给一个订阅者
    ///
    /// 先发送所有图片结果（按相册顺序），再发送合并的文本消息。
    /// 不返回错误，统计信息只用于日志。
    pub async fn deliver_chunk(
        &self,
        recipient: &RecipientId,
        chunk: &Chunk,
        header: &str,
    ) -> DeliveryReport {
        let mut report = DeliveryReport {
            attempted_items: chunk.results.len(),
            ..Default::default()
        };

        let (with_images, text_only): (Vec<&ResultItem>, Vec<&ResultItem>) =
            chunk.results.iter().partition(|item| item.has_image());

        let photo_items: Vec<PhotoItem<'_>> = with_images
            .into_iter()
            .filter_map(|item| {
                item.image().map(|image_url| PhotoItem {
                    item,
                    image_url,
                    caption: format_photo_caption(
                        &chunk.endpoint_name,
                        header,
                        &format_item(item, self.options.max_field_length),
                    ),
                })
            })
            .collect();

        for album in split_into_albums(&photo_items, self.options.album_size) {
            match self.options.album_mode {
                AlbumMode::Individual => {
                    for photo in album {
                        let outcome = self.deliver_photo(recipient, chunk, photo, &mut report).await;
                        report.record(outcome);
                    }
                }
                AlbumMode::Grouped if album.len() >= MIN_ALBUM_SIZE => {
                    self.deliver_album(recipient, chunk, album, &mut report).await;
                }
                // 相册至少两张图片，单张按普通图片发送
                AlbumMode::Grouped => {
                    for photo in album {
                        let outcome = self.deliver_photo(recipient, chunk, photo, &mut report).await;
                        report.record(outcome);
                    }
                }
            }
        }

        if !text_only.is_empty() {
            self.deliver_text_block(recipient, chunk, header, &text_only, &mut report)
                .await;
        }

        debug!(
            recipient = %recipient,
            endpoint = %chunk.endpoint_name,
            status = %chunk.status,
            "分组投递完成: {:?}",
            report
        );
        report
    }

    /// 发送单张图片，失败时降级为文本
    async fn deliver_photo(
        &self,
        recipient: &RecipientId,
        chunk: &Chunk,
        photo: &PhotoItem<'_>,
        report: &mut DeliveryReport,
    ) -> ItemOutcome {
        if photo.caption_too_long() {
            warn!(
                recipient = %recipient,
                endpoint = %chunk.endpoint_name,
                status = %chunk.status,
                unique_hash = %photo.item.unique_hash,
                "图片说明超过 {} 字符，直接以文本发送",
                MAX_CAPTION_LENGTH
            );
        } else {
            let options = PhotoOptions {
                caption: photo.caption.clone(),
                rich_markup: true,
            };

            self.limiter.acquire().await;
            report.send_calls += 1;
            match self
                .transport
                .send_photo(recipient, photo.image_url, &options)
                .await
            {
                Ok(()) => {
                    LoggingSystem::delivery_log("photo", recipient.as_str(), true, None);
                    return ItemOutcome::Rich;
                }
                Err(e) => {
                    warn!(
                        recipient = %recipient,
                        endpoint = %chunk.endpoint_name,
                        status = %chunk.status,
                        unique_hash = %photo.item.unique_hash,
                        image_url = %photo.image_url,
                        "图片发送失败，降级为文本发送: {}",
                        e
                    );
                    LoggingSystem::delivery_log(
                        "photo",
                        recipient.as_str(),
                        false,
                        Some(&e.to_string()),
                    );
                }
            }
        }

        self.deliver_fallback(recipient, chunk, photo, report).await
    }

    /// 以文本形式重发图片结果
    async fn deliver_fallback(
        &self,
        recipient: &RecipientId,
        chunk: &Chunk,
        photo: &PhotoItem<'_>,
        report: &mut DeliveryReport,
    ) -> ItemOutcome {
        match self
            .send_text(recipient, &photo.caption, report)
            .await
        {
            Ok(()) => {
                LoggingSystem::delivery_log("fallback_text", recipient.as_str(), true, None);
                ItemOutcome::Fallback
            }
            Err(e) => {
                error!(
                    recipient = %recipient,
                    endpoint = %chunk.endpoint_name,
                    status = %chunk.status,
                    unique_hash = %photo.item.unique_hash,
                    payload = %truncate(&photo.caption, LOGGED_PAYLOAD_LENGTH),
                    "降级文本发送失败，放弃该结果: {}",
                    e
                );
                LoggingSystem::delivery_log(
                    "fallback_text",
                    recipient.as_str(),
                    false,
                    Some(&e.to_string()),
                );
                ItemOutcome::Abandoned
            }
        }
    }

    /// 一次调用发送整个相册，失败时逐条降级为文本
    async fn deliver_album(
        &self,
        recipient: &RecipientId,
        chunk: &Chunk,
        album: &[PhotoItem<'_>],
        report: &mut DeliveryReport,
    ) {
        let oversized = album.iter().any(|photo| photo.caption_too_long());

        if oversized {
            warn!(
                recipient = %recipient,
                endpoint = %chunk.endpoint_name,
                status = %chunk.status,
                "相册中存在超长图片说明，整组以文本发送"
            );
        } else {
            let items: Vec<AlbumItem> = album
                .iter()
                .map(|photo| AlbumItem {
                    image_url: photo.image_url.to_string(),
                    caption: photo.caption.clone(),
                    rich_markup: true,
                })
                .collect();

            self.limiter.acquire().await;
            report.send_calls += 1;
            match self.transport.send_album(recipient, &items).await {
                Ok(()) => {
                    LoggingSystem::delivery_log("album", recipient.as_str(), true, None);
                    report.rich_delivered += album.len();
                    return;
                }
                Err(e) => {
                    warn!(
                        recipient = %recipient,
                        endpoint = %chunk.endpoint_name,
                        status = %chunk.status,
                        album_size = album.len(),
                        "相册发送失败，逐条降级为文本发送: {}",
                        e
                    );
                    LoggingSystem::delivery_log(
                        "album",
                        recipient.as_str(),
                        false,
                        Some(&e.to_string()),
                    );
                }
            }
        }

        for photo in album {
            let outcome = self.deliver_fallback(recipient, chunk, photo, report).await;
            report.record(outcome);
        }
    }

    /// 把无图片结果合并成一条文本消息发送，失败不重试
    async fn deliver_text_block(
        &self,
        recipient: &RecipientId,
        chunk: &Chunk,
        header: &str,
        items: &[&ResultItem],
        report: &mut DeliveryReport,
    ) {
        let item_texts: Vec<String> = items
            .iter()
            .map(|item| format_item(item, self.options.max_field_length))
            .collect();
        let text = format_text_block(&chunk.endpoint_name, chunk.status, header, &item_texts);

        match self.send_text(recipient, &text, report).await {
            Ok(()) => {
                LoggingSystem::delivery_log("text", recipient.as_str(), true, None);
                report.text_delivered += items.len();
            }
            Err(e) => {
                error!(
                    recipient = %recipient,
                    endpoint = %chunk.endpoint_name,
                    status = %chunk.status,
                    items = items.len(),
                    payload = %truncate(&text, LOGGED_PAYLOAD_LENGTH),
                    "文本消息发送失败: {}",
                    e
                );
                LoggingSystem::delivery_log("text", recipient.as_str(), false, Some(&e.to_string()));
                report.abandoned += items.len();
            }
        }
    }

    /// 经过限流器发送 HTML 文本，关闭链接预览
    async fn send_text(
        &self,
        recipient: &RecipientId,
        text: &str,
        report: &mut DeliveryReport,
    ) -> Result<(), TransportError> {
        self.limiter.acquire().await;
        report.send_calls += 1;
        self.transport
            .send_text(recipient, text, TextOptions::rich_without_preview())
            .await
    }
}
