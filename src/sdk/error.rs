//! SDK 错误类型
//!
//! 所有库函数都返回 [`Result`]，错误分为：网络错误、服务器业务错误、
//! 本地校验错误、认证错误等几类。

use thiserror::Error;

/// SDK 统一错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    /// 请求未完成，或服务器返回的不是 JSON（错误信息在本地生成）
    #[error("网络错误: {0}")]
    Network(String),

    /// 服务器明确返回失败（非 2xx 或 `ok: false`），信息取自服务器
    #[error("{message}")]
    Api { status: u16, message: String },

    /// 本地前置校验失败，不会发送到服务器
    #[error("{0}")]
    Validation(String),

    /// 登录 / 会话交换失败
    #[error("{0}")]
    Auth(String),

    /// 响应结构与预期不符
    #[error("解析响应失败: {0}")]
    Decode(String),

    /// 本地凭证存储读写失败
    #[error("凭证存储错误: {0}")]
    Storage(String),
}

impl SdkError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// 把服务器返回的业务失败转换为认证错误（保留服务器原始信息）
    pub(crate) fn into_auth(self) -> Self {
        match self {
            Self::Api { message, .. } => Self::Auth(message),
            Self::Decode(message) => Self::Auth(message),
            other => other,
        }
    }

    /// 面向用户展示的信息
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } | Self::Validation(message) | Self::Auth(message) => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<std::io::Error> for SdkError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
