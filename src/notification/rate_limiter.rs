//! 发送限流模块
//!
//! 进程内所有发送操作（文本、图片、相册、机器人回复）共用同一个限流器。
//! 限流器记录最近 N 次放行的时间，保证任意长度为 W 的滚动窗口内
//! 放行次数不超过 N。配额用完时调用方排队等待，不会被拒绝。

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// 默认窗口内最大发送次数
pub const DEFAULT_MAX_SENDS: usize = 20;

/// 默认窗口长度
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1000);

/// 窗口长度上限（一天）
pub const MAX_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// 限流器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterState {
    /// 当前窗口仍有配额
    Open,
    /// 当前窗口配额已用完
    Throttled,
}

/// 窗口内的放行记录
#[derive(Debug, Default)]
struct RateWindow {
    /// 最近放行的时间，按先后排列，最多 N 条
    admitted: VecDeque<Instant>,
}

impl RateWindow {
    /// 移除已经滑出窗口的记录
    fn evict_expired(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.admitted.front() {
            if oldest + window <= now {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

/// 全局发送限流器
#[derive(Debug)]
pub struct RateLimiter {
    /// 窗口内最大发送次数
    max_sends: usize,
    /// 窗口长度
    window: Duration,
    /// 放行记录，所有调用方共享
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    /// 创建限流器
    ///
    /// # 参数
    /// * `max_sends` - 窗口内最大发送次数，0 按 1 处理
    /// * `window` - 窗口长度，超过 [`MAX_WINDOW`] 时按上限处理
    pub fn new(max_sends: usize, window: Duration) -> Self {
        let max_sends = max_sends.max(1);
        Self {
            max_sends,
            window: window.min(MAX_WINDOW),
            state: Mutex::new(RateWindow {
                admitted: VecDeque::with_capacity(max_sends),
            }),
        }
    }

    /// 根据配置创建限流器
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_sends, Duration::from_millis(config.window_ms))
    }

    /// 窗口内最大发送次数
    pub fn max_sends(&self) -> usize {
        self.max_sends
    }

    /// 窗口长度
    pub fn window(&self) -> Duration {
        self.window
    }

    /// 申请一次发送配额
    ///
    /// 有配额时立即返回；配额用完时等待最早的放行记录滑出窗口后再放行。
    /// 等待期间持有锁，后续调用方按先来先到顺序排队。
    pub async fn acquire(&self) {
        let mut window = self.state.lock().await;
        loop {
            let now = Instant::now();
            window.evict_expired(now, self.window);

            if window.admitted.len() < self.max_sends {
                window.admitted.push_back(now);
                return;
            }

            if let Some(&oldest) = window.admitted.front() {
                let resume_at = oldest + self.window;
                debug!(
                    "发送配额已用完，等待 {}ms",
                    resume_at.saturating_duration_since(now).as_millis()
                );
                sleep_until(resume_at).await;
            }
        }
    }

    /// 当前状态
    pub async fn state(&self) -> LimiterState {
        let mut window = self.state.lock().await;
        window.evict_expired(Instant::now(), self.window);
        if window.admitted.len() < self.max_sends {
            LimiterState::Open
        } else {
            LimiterState::Throttled
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SENDS, DEFAULT_WINDOW)
    }
}
