//! CyberX SDK 模块
//!
//! 基于 HTTP JSON API 的会话管理和轮询式私信客户端。

pub mod account;
pub mod auth;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod scheduler;
pub mod social;
pub mod storage;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// 获取锁；持锁线程 panic 后仍然返回内部数据
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// 重新导出主要类型
pub use client::CyberxClient;
pub use config::ClientConfig;
pub use error::{Result, SdkError};
pub use types::User;
