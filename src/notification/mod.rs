//! 通知模块
//!
//! 提供结果格式化、分组、限流、订阅者管理和 Telegram 投递功能

pub mod delivery;
pub mod dispatcher;
pub mod format;
pub mod grouper;
pub mod model;
pub mod rate_limiter;
pub mod registry;
pub mod telegram;
pub mod transport;

// 重新导出主要类型
pub use delivery::{DeliveryOptions, DeliveryReport, DeliveryUnit};
pub use dispatcher::{DispatchSummary, Dispatcher};
pub use model::{
    Chunk, FilterDescriptor, NotificationBatch, RecipientId, ResultField, ResultItem, ResultStatus,
};
pub use rate_limiter::RateLimiter;
pub use registry::{create_registry, RecipientRegistry, StaticRecipientRegistry};
pub use telegram::TelegramTransport;
pub use transport::{AlbumItem, MessageTransport, PhotoOptions, TextOptions};
