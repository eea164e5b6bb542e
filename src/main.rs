//! Scrape Notify 主程序入口

use anyhow::{Context, Result};
use clap::Parser;
use scrape_notify::cli::{command_for, Args};
use scrape_notify::config::{ConfigLoader, GlobalConfig, TomlConfigLoader};
use scrape_notify::logging::{LogConfig, LoggingSystem};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 配置文件可读时使用其中的日志设置，命令行参数优先
    let global = TomlConfigLoader::new(true)
        .load_from_file(args.get_config_path())
        .await
        .map(|config| config.global)
        .unwrap_or_else(|_| GlobalConfig::default());
    let level_override = args.log_level.map(|level| level.to_string());
    let log_config = LogConfig::from_global(&global, level_override.as_deref());

    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("Scrape Notify v{} 启动", scrape_notify::VERSION);

    if let Err(e) = command_for(&args).execute(&args).await {
        error!("命令执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
