//! Scrape Notify - 抓取结果通知分发服务
//!
//! 接收抓取引擎推送的新增/更新结果，分组格式化后通过 Telegram 机器人
//! 发送给所有已订阅用户：
//! - 全局发送限流
//! - 图片消息失败时降级为纯文本
//! - 单个用户/单条结果失败互不影响
//! - 结构化日志记录

pub mod bot;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notification;
pub mod service;
pub mod web;

// 重新导出主要类型
pub use config::{Config, GlobalConfig};
pub use error::ScrapeNotifyError;
pub use notification::{Dispatcher, NotificationBatch, RateLimiter};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
