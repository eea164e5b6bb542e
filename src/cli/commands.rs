//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{Config, ConfigLoader, TomlConfigLoader};
use crate::error::{Result, ScrapeNotifyError};
use crate::notification::{
    MessageTransport, NotificationBatch, RateLimiter, RecipientId, TelegramTransport, TextOptions,
};
use crate::service::{ServiceComponents, ServiceLauncher};
use async_trait::async_trait;
use std::path::Path;

/// 配置文件模板
const CONFIG_TEMPLATE: &str = include_str!("../../config.example.toml");

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 根据子命令选择处理器
pub fn command_for(args: &Args) -> Box<dyn Command> {
    match &args.command {
        Commands::Serve { .. } => Box::new(ServeCommand),
        Commands::Send { .. } => Box::new(SendCommand),
        Commands::Init { .. } => Box::new(InitCommand),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::TestNotification { .. } => Box::new(TestNotificationCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    }
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 启动服务命令
pub struct ServeCommand;

#[async_trait]
impl Command for ServeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Serve { no_poll } = &args.command {
            let config = ServiceLauncher::load_and_validate_config(&args.get_config_path()).await?;
            let poll_updates = config.telegram.poll_updates && !no_poll;
            ServiceLauncher::run_foreground(config, poll_updates).await?;
        }
        Ok(())
    }
}

/// 单次分发命令
pub struct SendCommand;

#[async_trait]
impl Command for SendCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Send { batch_file } = &args.command {
            let config = ServiceLauncher::load_and_validate_config(&args.get_config_path()).await?;
            self.send_batch_file(&config, batch_file).await?;
        }
        Ok(())
    }
}

impl SendCommand {
    /// 读取结果批次文件并分发，打印分发汇总
    pub async fn send_batch_file(&self, config: &Config, batch_file: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(batch_file).await?;
        let batch: NotificationBatch = serde_json::from_str(&content)?;

        let components = ServiceComponents::build(config).await?;
        let summary = components.dispatcher.dispatch(&batch).await?;

        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件，已存在且未指定 force 时不覆盖
    pub async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(config_path, CONFIG_TEMPLATE).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请设置 TELEGRAM_BOT_TOKEN 环境变量并检查订阅者注册表配置");
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            self.validate_config_file(&config_file, *verbose)
                .await
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl ValidateCommand {
    /// 验证配置文件
    pub async fn validate_config_file(&self, config_path: &Path, verbose: bool) -> Result<Config> {
        println!("验证配置文件: {}", config_path.display());

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(config_path).await?;

        if verbose {
            println!("配置验证通过！");
            println!("全局配置:");
            println!("  日志级别: {}", config.global.log_level);
            println!("  JSON日志: {}", config.global.json_logs);
            println!("Telegram:");
            println!("  Bot API: {}", config.telegram.api_base_url);
            println!("  请求超时: {}秒", config.telegram.request_timeout_seconds);
            println!("  处理机器人命令: {}", config.telegram.poll_updates);
            println!("限流:");
            println!(
                "  {} 次 / {}ms",
                config.rate_limit.max_sends, config.rate_limit.window_ms
            );
            println!("分发:");
            println!("  字段最大长度: {}", config.dispatch.max_field_length);
            println!("  相册大小: {}", config.dispatch.album_size);
            println!("  相册模式: {:?}", config.dispatch.album_mode);
            println!(
                "  并发用户数: {}",
                config.dispatch.max_concurrent_recipients
            );
            println!("订阅者注册表: {:?}", config.registry.backend);
            println!(
                "Web: {}:{}",
                config.web.bind_address, config.web.port
            );
        } else {
            println!("✓ 配置文件验证通过");
        }

        Ok(config)
    }
}

/// 测试通知命令
pub struct TestNotificationCommand;

#[async_trait]
impl Command for TestNotificationCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::TestNotification { recipient, message } = &args.command {
            let config = ServiceLauncher::load_and_validate_config(&args.get_config_path()).await?;
            self.send_test_message(&config, recipient, message).await?;
        }
        Ok(())
    }
}

impl TestNotificationCommand {
    /// 发送一条纯文本测试消息
    pub async fn send_test_message(
        &self,
        config: &Config,
        recipient: &str,
        message: &str,
    ) -> Result<()> {
        let transport = TelegramTransport::from_config(&config.telegram)?;
        let limiter = RateLimiter::from_config(&config.rate_limit);

        println!("发送测试消息到: {}", recipient);
        limiter.acquire().await;
        transport
            .send_text(&RecipientId::from(recipient), message, TextOptions::plain())
            .await
            .map_err(ScrapeNotifyError::from)?;

        println!("✓ 测试消息发送成功");
        Ok(())
    }
}
