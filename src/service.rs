//! 服务管理模块
//!
//! 负责组件初始化和服务生命周期管理

use crate::bot::UpdatePoller;
use crate::config::{Config, ConfigLoader, TomlConfigLoader};
use crate::notification::{
    create_registry, Dispatcher, RateLimiter, RecipientRegistry, TelegramTransport,
};
use crate::web::WebServer;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// 服务组件
pub struct ServiceComponents {
    /// 全局限流器，通知和机器人回复共用
    pub limiter: Arc<RateLimiter>,
    /// Telegram 发送器
    pub transport: Arc<TelegramTransport>,
    /// 订阅者注册表
    pub registry: Arc<dyn RecipientRegistry>,
    /// 通知分发器
    pub dispatcher: Arc<Dispatcher>,
}

impl ServiceComponents {
    /// 根据配置创建所有组件
    pub async fn build(config: &Config) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let transport = Arc::new(
            TelegramTransport::from_config(&config.telegram).context("创建 Telegram 发送器失败")?,
        );
        let registry = create_registry(&config.registry)
            .await
            .context("创建订阅者注册表失败")?;

        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            transport.clone(),
            limiter.clone(),
            &config.dispatch,
        ));

        info!(
            "组件初始化完成: 限流 {} 次/{}ms，注册表 {:?}",
            limiter.max_sends(),
            limiter.window().as_millis(),
            config.registry.backend
        );

        Ok(Self {
            limiter,
            transport,
            registry,
            dispatcher,
        })
    }
}

/// 服务启动器
pub struct ServiceLauncher;

impl ServiceLauncher {
    /// 加载和验证配置
    pub async fn load_and_validate_config(config_path: &Path) -> Result<Config> {
        if !config_path.exists() {
            return Err(anyhow::anyhow!(
                "配置文件不存在: {}\n提示：请运行 'scrape-notify init' 创建默认配置文件",
                config_path.display()
            ));
        }

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_file(config_path)
            .await
            .with_context(|| format!("加载配置文件失败: {}", config_path.display()))?;

        Ok(config)
    }

    /// 前台运行服务，Ctrl+C 触发关闭
    pub async fn run_foreground(config: Config, poll_updates: bool) -> Result<()> {
        let (shutdown_tx, _) = broadcast::channel(1);

        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("收到中断信号，正在停止服务...");
                    let _ = shutdown_tx_clone.send(());
                }
                Err(err) => {
                    error!("监听中断信号失败: {}", err);
                }
            }
        });

        Self::run(config, poll_updates, shutdown_tx).await
    }

    /// 服务主逻辑
    ///
    /// 启动 Web 接口，按需启动机器人更新轮询，直到收到关闭信号。
    pub async fn run(
        config: Config,
        poll_updates: bool,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Result<()> {
        let components = ServiceComponents::build(&config).await?;

        match components.transport.get_me().await {
            Ok(bot) => info!(
                "机器人令牌验证通过: @{}",
                bot.username.as_deref().unwrap_or("-")
            ),
            Err(e) => warn!("机器人令牌验证失败: {}", e),
        }

        let poller_handle = if poll_updates {
            let poller = UpdatePoller::new(
                components.transport.clone(),
                components.transport.clone(),
                components.registry.clone(),
                components.limiter.clone(),
                config.telegram.poll_timeout_seconds,
            );
            Some(tokio::spawn(poller.run(shutdown_tx.subscribe())))
        } else {
            info!("机器人更新轮询已禁用");
            None
        };

        let web_server = WebServer::new(config.web.clone(), components.dispatcher.clone());
        let web_result = web_server.start(shutdown_tx.subscribe()).await;

        // Web 服务器异常退出时也要停止轮询
        let _ = shutdown_tx.send(());
        if let Some(handle) = poller_handle {
            if let Err(e) = handle.await {
                error!("更新轮询任务退出异常: {}", e);
            }
        }

        web_result?;
        info!("服务已停止");
        Ok(())
    }
}
