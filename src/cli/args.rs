//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Scrape Notify - 抓取结果 Telegram 通知服务
#[derive(Parser, Debug, Clone)]
#[command(
    name = "scrape-notify",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "SCRAPE_NOTIFY_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件中的设置
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "SCRAPE_NOTIFY_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动通知服务（HTTP 接口和机器人命令处理）
    Serve {
        /// 不处理机器人命令，只提供 HTTP 接口
        #[arg(long, help = "不轮询机器人更新")]
        no_poll: bool,
    },

    /// 从 JSON 文件读取结果批次并分发一次
    Send {
        /// 结果批次文件
        #[arg(value_name = "FILE", help = "结果批次 JSON 文件")]
        batch_file: PathBuf,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "config.toml"
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 向指定用户发送测试消息
    TestNotification {
        /// 接收者ID
        #[arg(short, long, value_name = "ID", help = "接收者ID")]
        recipient: String,

        /// 测试消息内容
        #[arg(short, long, default_value = "这是一条测试消息", help = "测试消息内容")]
        message: String,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::get_default_config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let args = Args::try_parse_from(["scrape-notify", "-c", "/tmp/a.toml", "serve"]).unwrap();
        assert_eq!(args.get_config_path(), PathBuf::from("/tmp/a.toml"));
        assert!(matches!(args.command, Commands::Serve { no_poll: false }));
    }

    #[test]
    fn test_parse_log_level() {
        let args =
            Args::try_parse_from(["scrape-notify", "--log-level", "debug", "version"]).unwrap();
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert_eq!(log::LevelFilter::from(LogLevel::Debug), log::LevelFilter::Debug);
    }

    #[test]
    fn test_parse_test_notification() {
        let args = Args::try_parse_from([
            "scrape-notify",
            "test-notification",
            "--recipient",
            "42",
        ])
        .unwrap();

        match args.command {
            Commands::TestNotification { recipient, message } => {
                assert_eq!(recipient, "42");
                assert_eq!(message, "这是一条测试消息");
            }
            other => panic!("解析结果错误: {other:?}"),
        }
    }

    #[test]
    fn test_send_requires_file() {
        assert!(Args::try_parse_from(["scrape-notify", "send"]).is_err());
    }
}
