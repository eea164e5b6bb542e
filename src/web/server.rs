//! Web服务器实现

use super::{create_router, AppState};
use crate::config::WebConfig;
use crate::notification::Dispatcher;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Web服务器
pub struct WebServer {
    /// 配置
    config: WebConfig,
    /// 应用状态
    state: AppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: WebConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config,
            state: AppState::new(dispatcher),
        }
    }

    /// 监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .with_context(|| {
                format!(
                    "无效的监听地址: {}:{}",
                    self.config.bind_address, self.config.port
                )
            })
    }

    /// 启动Web服务器，收到关闭信号后停止接收新连接
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let addr = self.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("绑定监听地址失败: {}", addr))?;

        let app = create_router(self.state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        info!("Web服务器已启动: http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await
            .context("Web服务器运行失败")?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
