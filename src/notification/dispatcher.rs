//! 通知分发模块
//!
//! 一次分发：读取订阅者快照，按端点和状态分组，依次投递给每个订阅者。

use crate::config::types::DispatchConfig;
use crate::error::Result;
use crate::notification::delivery::{DeliveryOptions, DeliveryReport, DeliveryUnit};
use crate::notification::format::format_header;
use crate::notification::grouper::group_by_endpoint_and_status;
use crate::notification::model::{Chunk, NotificationBatch, RecipientId};
use crate::notification::rate_limiter::RateLimiter;
use crate::notification::registry::RecipientRegistry;
use crate::notification::transport::MessageTransport;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 一次分发所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    /// 已接收批次
    Init,
    /// 已生成头部
    HeaderReady,
    /// 正在投递
    Delivering,
    /// 分发结束
    Done,
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchPhase::Init => "init",
            DispatchPhase::HeaderReady => "header_ready",
            DispatchPhase::Delivering => "delivering",
            DispatchPhase::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// 分发汇总
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    /// 本次分发ID
    pub dispatch_id: Uuid,
    /// 订阅者数量
    pub recipients: usize,
    /// 分组数量
    pub chunks: usize,
    /// 所有订阅者的投递统计之和
    pub report: DeliveryReport,
    /// 耗时（毫秒）
    pub elapsed_ms: u64,
}

/// 通知分发器
pub struct Dispatcher {
    /// 订阅者注册表
    registry: Arc<dyn RecipientRegistry>,
    /// 投递单元
    delivery: DeliveryUnit,
    /// 同时投递的最大订阅者数
    max_concurrent_recipients: usize,
}

impl Dispatcher {
    /// 创建分发器
    ///
    /// # 参数
    /// * `registry` - 订阅者注册表
    /// * `transport` - 消息通道
    /// * `limiter` - 全局限流器，与机器人回复共用
    /// * `config` - 分发配置
    pub fn new(
        registry: Arc<dyn RecipientRegistry>,
        transport: Arc<dyn MessageTransport>,
        limiter: Arc<RateLimiter>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            registry,
            delivery: DeliveryUnit::new(transport, limiter, DeliveryOptions::from(config)),
            max_concurrent_recipients: config.max_concurrent_recipients.max(1),
        }
    }

    /// 分发一批结果
    ///
    /// 订阅者列表只读取一次；读取失败时不发送任何消息并返回错误。
    /// 单条消息的发送失败不影响其他消息，也不会让本次分发失败。
    ///
    /// # 参数
    /// * `batch` - 待通知的结果批次
    ///
    /// # 返回
    /// * `Result<DispatchSummary>` - 分发汇总
    pub async fn dispatch(&self, batch: &NotificationBatch) -> Result<DispatchSummary> {
        let dispatch_id = Uuid::new_v4();
        let started = Instant::now();
        debug!(%dispatch_id, phase = %DispatchPhase::Init, "收到 {} 条结果", batch.results.len());

        let recipients = self.registry.list_active_recipients().await.map_err(|e| {
            warn!(%dispatch_id, "读取订阅者列表失败: {}", e);
            e
        })?;

        if batch.results.is_empty() {
            info!(%dispatch_id, "结果为空，跳过分发");
            return Ok(DispatchSummary {
                dispatch_id,
                recipients: recipients.len(),
                chunks: 0,
                report: DeliveryReport::default(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let chunks = group_by_endpoint_and_status(&batch.results);
        let header = format_header(&batch.group_name, &batch.filters);
        debug!(
            %dispatch_id,
            phase = %DispatchPhase::HeaderReady,
            "{} 个分组，{} 个订阅者",
            chunks.len(),
            recipients.len()
        );

        if recipients.is_empty() {
            info!(%dispatch_id, "没有活跃订阅者，跳过分发");
        }

        debug!(%dispatch_id, phase = %DispatchPhase::Delivering, "开始投递");
        // 先生成每个订阅者的投递 future，再交给 buffered 保持顺序
        let deliveries: Vec<_> = recipients
            .iter()
            .map(|recipient| self.deliver_to_recipient(dispatch_id, recipient, &chunks, &header))
            .collect();
        let reports: Vec<DeliveryReport> = stream::iter(deliveries)
            .buffered(self.max_concurrent_recipients)
            .collect()
            .await;

        let mut report = DeliveryReport::default();
        for recipient_report in reports {
            report += recipient_report;
        }

        let summary = DispatchSummary {
            dispatch_id,
            recipients: recipients.len(),
            chunks: chunks.len(),
            report,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            %dispatch_id,
            phase = %DispatchPhase::Done,
            "分发完成: {} 个订阅者，{} 个分组，送达 {} 条，放弃 {} 条，耗时 {}ms",
            summary.recipients,
            summary.chunks,
            summary.report.delivered(),
            summary.report.abandoned,
            summary.elapsed_ms
        );
        Ok(summary)
    }

    /// 按分组顺序把所有分组投递给一个订阅者
    async fn deliver_to_recipient(
        &self,
        dispatch_id: Uuid,
        recipient: &RecipientId,
        chunks: &[Chunk],
        header: &str,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for chunk in chunks.iter().filter(|chunk| !chunk.results.is_empty()) {
            report += self.delivery.deliver_chunk(recipient, chunk, header).await;
        }

        debug!(
            %dispatch_id,
            recipient = %recipient,
            "订阅者投递完成，送达 {} 条",
            report.delivered()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(DispatchPhase::Init.to_string(), "init");
        assert_eq!(DispatchPhase::Done.to_string(), "done");
    }
}
