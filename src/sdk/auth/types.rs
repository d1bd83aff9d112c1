//! 认证 DTO 与会话状态类型

use crate::sdk::error::SdkError;
use crate::sdk::types::User;
use serde::{Deserialize, Serialize};

/// 登录方式及其载荷
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderPayload {
    /// 用户名 / 邮箱 + 密码
    Password { identifier: String, secret: String },
    /// Google Identity Services 返回的 id_token
    Google { id_token: String },
    /// GitHub OAuth 回调中的授权码
    Github { code: String },
    /// Telegram 登录组件回调（带签名）
    Telegram(TelegramAuth),
}

impl ProviderPayload {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Password { .. } => Provider::Password,
            Self::Google { .. } => Provider::Google,
            Self::Github { .. } => Provider::Github,
            Self::Telegram(_) => Provider::Telegram,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Password,
    Google,
    Github,
    Telegram,
}

impl Provider {
    /// 会话交换端点
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Password => "login.php",
            Self::Google => "oauth_google.php",
            Self::Github => "oauth_github.php",
            Self::Telegram => "oauth_telegram.php",
        }
    }
}

/// Telegram 登录组件回调数据，原样转交服务器校验签名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramAuth {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub auth_date: i64,
    pub hash: String,
}

/// 会话交换响应；token 或 user 缺失视为失败
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// 没有 token
    #[default]
    Unauthenticated,
    /// 已有 token，正在获取当前用户
    Resolving,
    /// token + 已解析的用户
    Authenticated,
}

/// 会话快照
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub user: Option<User>,
    pub status: SessionStatus,
}

impl SessionSnapshot {
    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Resolving
    }
}

/// 获取当前用户的结果；由调用方决定是否登出
#[derive(Debug, Clone, PartialEq)]
pub enum UserFetch {
    Resolved(User),
    /// 服务器拒绝了 token（过期 / 无效）或请求失败
    Rejected(SdkError),
    /// 当前没有 token
    NoSession,
}

/// 注册请求
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// 找回密码第一步的响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgotPasswordResp {
    #[serde(default, deserialize_with = "crate::sdk::types::deserialize_lenient_bool")]
    pub email_sent: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub masked_email: Option<String>,
}

/// 验证码用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    VerifyEmail,
    ResetPassword,
}

impl CodePurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::ResetPassword => "reset_password",
        }
    }
}
