//! 账户设置服务层
//!
//! 用户名 / 姓名 / 头像修改，以及分步的密码、邮箱修改流程。
//! 修改成功后同步更新 [`SessionManager`] 中的当前用户。

use crate::sdk::account::api::AccountApi;
use crate::sdk::account::types::{Availability, AvatarUpload, PasswordStage};
use crate::sdk::auth::recovery::validate_new_password;
use crate::sdk::auth::SessionManager;
use crate::sdk::error::{Result, SdkError};
use std::sync::Arc;
use tracing::{debug, info};

pub struct AccountService {
    api: AccountApi,
    session: Arc<SessionManager>,
}

impl AccountService {
    pub fn new(api: AccountApi, session: Arc<SessionManager>) -> Self {
        Self { api, session }
    }

    fn token(&self) -> Result<String> {
        self.session.token().ok_or_else(|| SdkError::auth("未登录"))
    }

    /// 检查用户名是否可用；空值或与当前用户名相同时不发请求
    pub async fn check_username(&self, candidate: &str) -> Availability {
        let candidate = candidate.trim();
        let own = self.session.current_user().map(|u| u.username);
        if candidate.is_empty() || own.as_deref() == Some(candidate) {
            return Availability::Unknown;
        }
        let Ok(token) = self.token() else {
            return Availability::Unknown;
        };
        availability(self.api.username_check(&token, candidate).await)
    }

    /// 检查邮箱是否可用；规则同用户名
    pub async fn check_email(&self, candidate: &str) -> Availability {
        let candidate = candidate.trim();
        let own = self.session.current_user().and_then(|u| u.email);
        if candidate.is_empty() || own.as_deref() == Some(candidate) {
            return Availability::Unknown;
        }
        let Ok(token) = self.token() else {
            return Availability::Unknown;
        };
        availability(self.api.email_check(&token, candidate).await)
    }

    /// 修改用户名，返回服务器确认后的用户名
    pub async fn update_username(&self, username: &str) -> Result<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(SdkError::validation("用户名不能为空"));
        }
        let token = self.token()?;
        let confirmed = self.api.update_username(&token, username).await?;
        self.session
            .update_current_user(|u| u.username = confirmed.clone());
        info!("[Account] 用户名已修改为 {}", confirmed);
        Ok(confirmed)
    }

    /// 修改姓名，返回下一次允许修改的时间
    pub async fn update_name(&self, name: &str) -> Result<Option<String>> {
        let token = self.token()?;
        let resp = self.api.update_name(&token, name.trim()).await?;
        let name = name.trim().to_string();
        let next = resp.can_change_name_at.clone();
        self.session.update_current_user(|u| {
            u.name = Some(name);
            u.can_change_name_at = next;
        });
        Ok(resp.can_change_name_at)
    }

    /// 上传头像（仅 JPEG / PNG / WEBP），返回新的头像地址
    pub async fn upload_avatar(&self, avatar: AvatarUpload) -> Result<String> {
        if !avatar.is_supported() {
            return Err(SdkError::validation("只允许 JPG、PNG 或 WEBP 格式"));
        }
        let token = self.token()?;
        let url = self.api.upload_avatar(&token, avatar).await?;
        self.session
            .update_current_user(|u| u.profile_image_url = Some(url.clone()));
        Ok(url)
    }

    /// 开始修改密码流程
    pub fn begin_password_change(&self) -> PasswordChange {
        PasswordChange {
            api: self.api.clone(),
            session: self.session.clone(),
            stage: PasswordStage::default(),
            new_password: None,
        }
    }

    /// 请求邮箱修改验证码；新邮箱与当前邮箱相同时报错
    pub async fn request_email_change(&self, new_email: &str) -> Result<()> {
        let new_email = new_email.trim();
        if new_email.is_empty() {
            return Err(SdkError::validation("邮箱不能为空"));
        }
        let current = self.session.current_user().and_then(|u| u.email);
        if current.as_deref() == Some(new_email) {
            return Err(SdkError::validation("新邮箱与当前邮箱相同"));
        }
        let token = self.token()?;
        self.api.email_change_request(&token).await?;
        info!("[Account] 邮箱修改验证码已发送");
        Ok(())
    }

    /// 用验证码确认邮箱修改
    pub async fn email_change_confirm(&self, new_email: &str, code: &str) -> Result<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(SdkError::validation("请输入验证码"));
        }
        let token = self.token()?;
        let new_email = new_email.trim().to_string();
        self.api.email_change_confirm(&token, &new_email, code).await?;
        self.session.update_current_user(|u| u.email = Some(new_email));
        Ok(())
    }
}

fn availability(result: Result<bool>) -> Availability {
    match result {
        Ok(true) => Availability::Available,
        Ok(false) => Availability::Taken,
        Err(e) => {
            debug!("[Account] 可用性检查失败: {}", e);
            Availability::Unknown
        }
    }
}

/// 分步修改密码：验证当前密码 → 发送验证码 → 确认并退出登录
pub struct PasswordChange {
    api: AccountApi,
    session: Arc<SessionManager>,
    stage: PasswordStage,
    new_password: Option<String>,
}

impl PasswordChange {
    pub fn stage(&self) -> PasswordStage {
        self.stage
    }

    fn token(&self) -> Result<String> {
        self.session.token().ok_or_else(|| SdkError::auth("未登录"))
    }

    fn expect_stage(&self, expected: PasswordStage) -> Result<()> {
        if self.stage != expected {
            return Err(SdkError::validation(format!(
                "当前步骤为 {:?}，不能执行此操作",
                self.stage
            )));
        }
        Ok(())
    }

    pub async fn check_current(&mut self, current: &str) -> Result<()> {
        self.expect_stage(PasswordStage::CurrentPassword)?;
        if current.is_empty() {
            return Err(SdkError::validation("请输入当前密码"));
        }
        let token = self.token()?;
        self.api.password_change_check(&token, current).await?;
        self.stage = PasswordStage::NewPassword;
        Ok(())
    }

    /// 校验新密码后请求验证码
    pub async fn send_code(&mut self, new_password: &str, confirmation: &str) -> Result<()> {
        self.expect_stage(PasswordStage::NewPassword)?;
        validate_new_password(new_password, confirmation)?;
        let token = self.token()?;
        self.api.password_change_send_code(&token).await?;
        self.new_password = Some(new_password.to_string());
        self.stage = PasswordStage::AwaitingCode;
        Ok(())
    }

    /// 提交验证码和新密码，成功后退出登录
    pub async fn confirm(&mut self, code: &str) -> Result<()> {
        self.expect_stage(PasswordStage::AwaitingCode)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(SdkError::validation("请输入验证码"));
        }
        let new_password = self
            .new_password
            .clone()
            .ok_or_else(|| SdkError::validation("缺少新密码"))?;
        let token = self.token()?;
        self.api
            .password_change_confirm(&token, code, &new_password)
            .await?;
        self.stage = PasswordStage::Completed;
        self.new_password = None;
        info!("[Account] 密码已修改，退出登录");
        self.session.logout().await;
        Ok(())
    }
}
