//! Web 路由处理函数

use super::{ApiError, AppState};
use crate::logging::LoggingSystem;
use crate::notification::NotificationBatch;
use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};
use tracing::{error, info};

/// 首页
pub async fn index() -> &'static str {
    "Hello from scrape-notify!"
}

/// 健康检查
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime_seconds = (chrono::Utc::now() - state.start_time).num_seconds().max(0);

    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "uptime_seconds": uptime_seconds,
        "deliveries": LoggingSystem::delivery_stats(),
    }))
}

/// 接收抓取结果并分发通知
///
/// 分发结束后才返回；订阅者列表不可用时返回 500。
pub async fn send_notification(
    State(state): State<AppState>,
    Json(batch): Json<NotificationBatch>,
) -> Result<Json<Value>, ApiError> {
    info!(
        "收到通知请求: 分组 {}，{} 条结果",
        batch.group_name,
        batch.results.len()
    );

    match state.dispatcher.dispatch(&batch).await {
        Ok(summary) => {
            info!(
                "通知请求 {} 处理完成，送达 {} 条",
                summary.dispatch_id,
                summary.report.delivered()
            );
            Ok(Json(json!({ "success": true })))
        }
        Err(e) => {
            error!("通知分发失败: {}", e);
            Err(e.into())
        }
    }
}
