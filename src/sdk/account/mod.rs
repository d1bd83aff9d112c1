//! 账户设置模块

pub mod api;
pub mod service;
pub mod types;

// 重新导出主要类型
pub use api::AccountApi;
pub use service::{AccountService, PasswordChange};
pub use types::{Availability, AvatarUpload, PasswordStage};
