//! 机器人模块
//!
//! 处理用户发给机器人的命令

pub mod poller;

pub use poller::{StartOutcome, UpdatePoller, UpdateSource};
