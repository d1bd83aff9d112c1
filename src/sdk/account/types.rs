//! 账户设置 DTO

use crate::sdk::types::deserialize_lenient_bool;
use serde::Deserialize;

/// 用户名 / 邮箱可用性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Taken,
    /// 未检查（空值、与当前值相同或请求失败）
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityResp {
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUsernameResp {
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateNameResp {
    #[serde(default)]
    pub can_change_name_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarResp {
    pub profile_image_url: String,
}

/// 头像只接受这些 MIME 类型
pub const AVATAR_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// 待上传的头像
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    pub fn is_supported(&self) -> bool {
        AVATAR_MIME_TYPES.contains(&self.mime.as_str())
    }
}

/// 修改密码流程所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordStage {
    /// 等待验证当前密码
    #[default]
    CurrentPassword,
    /// 当前密码已验证，等待输入新密码
    NewPassword,
    /// 验证码已发送
    AwaitingCode,
    /// 已修改并退出登录
    Completed,
}
