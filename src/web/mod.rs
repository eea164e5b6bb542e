//! Web 接口模块
//!
//! 提供抓取引擎调用的通知触发接口和健康检查接口

use crate::error::ScrapeNotifyError;
use crate::notification::Dispatcher;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

pub mod handlers;
pub mod server;

pub use server::WebServer;

/// Web 应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 通知分发器
    pub dispatcher: Arc<Dispatcher>,
    /// 启动时间
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// 创建应用状态
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            start_time: chrono::Utc::now(),
        }
    }
}

/// 接口错误，统一返回 `{"success": false, "error": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// 创建接口错误
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ScrapeNotifyError> for ApiError {
    fn from(error: ScrapeNotifyError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// 创建路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/send-notification", post(handlers::send_notification))
        .route("/send-notification/", post(handlers::send_notification))
        .with_state(state)
}
