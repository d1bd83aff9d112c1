//! 认证模块
//!
//! 会话管理（登录、第三方登录、登出、当前用户校验、心跳）以及注册和密码找回

pub mod api;
pub mod listener;
pub mod recovery;
pub mod service;
pub mod types;

// 重新导出主要类型
pub use api::AuthApi;
pub use listener::{EmptySessionListener, SessionListener};
pub use recovery::{mask_email, validate_new_password, RecoveryService, ResetStart};
pub use service::SessionManager;
pub use types::{
    CodePurpose, Provider, ProviderPayload, RegisterRequest, SessionSnapshot, SessionStatus,
    TelegramAuth, UserFetch,
};
