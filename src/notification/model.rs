//! 通知数据模型
//!
//! 抓取引擎推送的结果批次，以及分组后的发送单元

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 结果变化状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// 新增结果
    New,
    /// 已有结果发生更新
    Updated,
}

impl ResultStatus {
    /// 消息中展示的标签
    pub fn label(&self) -> &'static str {
        match self {
            ResultStatus::New => "New",
            ResultStatus::Updated => "Updated",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 结果中的单个字段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultField {
    /// 字段名称
    pub field_name: String,
    /// 字段值，抓取引擎不保证是字符串
    #[serde(default)]
    pub value: Value,
}

/// 单条抓取结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    /// 结果唯一标识
    #[serde(default)]
    pub unique_hash: String,
    /// 所属端点名称
    pub endpoint_name: String,
    /// 结果链接
    #[serde(default)]
    pub url: String,
    /// 需要通知的字段，保持推送顺序
    #[serde(default)]
    pub fields: Vec<ResultField>,
    /// 变化状态
    pub status: ResultStatus,
    /// 图片链接
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ResultItem {
    /// 返回可用的图片链接，空字符串视为没有图片
    pub fn image(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// 是否带图片
    pub fn has_image(&self) -> bool {
        self.image().is_some()
    }
}

/// 通知头部展示的过滤条件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescriptor {
    /// 字段名称
    #[serde(default)]
    pub field_name: String,
    /// 比较运算符
    #[serde(default)]
    pub operator: String,
    /// 比较值
    #[serde(default)]
    pub value: Value,
}

/// 一次通知请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBatch {
    /// 结果列表
    #[serde(default)]
    pub results: Vec<ResultItem>,
    /// 过滤条件
    #[serde(default)]
    pub filters: Vec<FilterDescriptor>,
    /// 抓取分组名称
    pub group_name: String,
}

/// 同一端点、同一状态的结果集合
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 端点名称
    pub endpoint_name: String,
    /// 变化状态
    pub status: ResultStatus,
    /// 结果列表
    pub results: Vec<ResultItem>,
}

/// 订阅者标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    /// 创建订阅者标识
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 原始标识字符串
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecipientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
