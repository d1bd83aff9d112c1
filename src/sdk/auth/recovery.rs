//! 注册、邮箱验证与密码重置（无需登录）

use crate::sdk::auth::api::AuthApi;
use crate::sdk::auth::types::{CodePurpose, RegisterRequest};
use crate::sdk::error::{Result, SdkError};
use tracing::info;

/// 密码最小长度
pub const MIN_PASSWORD_LEN: usize = 8;

/// 新密码的本地校验：长度与两次输入一致
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(SdkError::validation(format!(
            "密码至少需要 {} 个字符",
            MIN_PASSWORD_LEN
        )));
    }
    if password != confirmation {
        return Err(SdkError::validation("两次输入的密码不一致"));
    }
    Ok(())
}

/// 邮箱脱敏（服务器未返回脱敏邮箱时使用）：`alice@mail.uz` → `al**@mail.uz`
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };
    if domain.is_empty() {
        return email.to_string();
    }
    let head: String = local.chars().take(2).collect();
    let stars = local.chars().count().saturating_sub(3).max(1);
    format!("{}{}@{}", head, "*".repeat(stars), domain)
}

/// 找回密码第一步的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetStart {
    /// 验证码已发送到该邮箱
    CodeSent { email: String, masked_email: String },
    /// 服务器不透露账号是否存在
    Unconfirmed,
}

pub struct RecoveryService {
    api: AuthApi,
}

impl RecoveryService {
    pub fn new(api: AuthApi) -> Self {
        Self { api }
    }

    /// 注册；成功后服务器向邮箱发送验证码
    pub async fn register(&self, req: RegisterRequest) -> Result<()> {
        if req.username.trim().is_empty() || req.email.trim().is_empty() {
            return Err(SdkError::validation("用户名和邮箱不能为空"));
        }
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SdkError::validation(format!(
                "密码至少需要 {} 个字符",
                MIN_PASSWORD_LEN
            )));
        }
        self.api.register(&req).await?;
        info!("[Recovery] ✅ 注册成功，等待邮箱验证: {}", mask_email(&req.email));
        Ok(())
    }

    pub async fn verify_email(&self, email: &str, code: &str) -> Result<()> {
        require_code(code)?;
        self.api.verify_code(email, code.trim(), CodePurpose::VerifyEmail).await
    }

    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        self.api.resend_code(email, CodePurpose::VerifyEmail).await
    }

    /// 找回密码：按用户名或邮箱发送验证码
    pub async fn start_reset(&self, identifier: &str) -> Result<ResetStart> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(SdkError::validation("请输入用户名或邮箱"));
        }
        let resp = self.api.forgot_password(identifier).await?;
        match (resp.email_sent, resp.email) {
            (true, Some(email)) if !email.is_empty() => {
                let masked_email = resp
                    .masked_email
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| mask_email(&email));
                Ok(ResetStart::CodeSent {
                    email,
                    masked_email,
                })
            }
            _ => Ok(ResetStart::Unconfirmed),
        }
    }

    pub async fn verify_reset_code(&self, email: &str, code: &str) -> Result<()> {
        require_code(code)?;
        self.api
            .verify_code(email, code.trim(), CodePurpose::ResetPassword)
            .await
    }

    pub async fn resend_reset_code(&self, email: &str) -> Result<()> {
        self.api.resend_code(email, CodePurpose::ResetPassword).await
    }

    pub async fn set_new_password(
        &self,
        email: &str,
        code: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<()> {
        require_code(code)?;
        validate_new_password(password, confirmation)?;
        self.api.reset_password(email, code.trim(), password).await?;
        info!("[Recovery] 🔑 密码已重置: {}", mask_email(email));
        Ok(())
    }
}

fn require_code(code: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(SdkError::validation("请输入验证码"));
    }
    Ok(())
}
