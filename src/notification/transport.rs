//! 消息通道抽象
//!
//! 定义发送文本、图片和相册三种能力，每次调用都可能失败

use crate::error::TransportError;
use crate::notification::model::RecipientId;
use async_trait::async_trait;

/// 文本消息选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOptions {
    /// 是否按 HTML 解析
    pub rich_markup: bool,
    /// 是否关闭链接预览
    pub suppress_link_preview: bool,
}

impl TextOptions {
    /// HTML 文本，关闭链接预览
    pub fn rich_without_preview() -> Self {
        Self {
            rich_markup: true,
            suppress_link_preview: true,
        }
    }

    /// 纯文本
    pub fn plain() -> Self {
        Self {
            rich_markup: false,
            suppress_link_preview: false,
        }
    }
}

/// 图片消息选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoOptions {
    /// 图片说明
    pub caption: String,
    /// 说明是否按 HTML 解析
    pub rich_markup: bool,
}

/// 相册中的一张图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumItem {
    /// 图片链接
    pub image_url: String,
    /// 图片说明
    pub caption: String,
    /// 说明是否按 HTML 解析
    pub rich_markup: bool,
}

/// 消息通道trait
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// 发送文本消息
    ///
    /// # 参数
    /// * `recipient` - 接收者
    /// * `text` - 消息内容
    /// * `options` - 文本选项
    async fn send_text(
        &self,
        recipient: &RecipientId,
        text: &str,
        options: TextOptions,
    ) -> Result<(), TransportError>;

    /// 发送带说明的图片
    async fn send_photo(
        &self,
        recipient: &RecipientId,
        image_url: &str,
        options: &PhotoOptions,
    ) -> Result<(), TransportError>;

    /// 发送相册，最多 10 张图片
    async fn send_album(
        &self,
        recipient: &RecipientId,
        items: &[AlbumItem],
    ) -> Result<(), TransportError>;
}
