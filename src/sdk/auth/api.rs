//! 认证 HTTP API 客户端
//!
//! 负责登录、会话交换、心跳、当前用户、注册、验证码和密码重置相关请求

use crate::sdk::auth::types::{
    CodePurpose, ForgotPasswordResp, ProviderPayload, RegisterRequest, SessionPayload,
};
use crate::sdk::error::{Result, SdkError};
use crate::sdk::transport::{ApiRequest, Transport};
use crate::sdk::types::{decode, User};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// 认证相关的 HTTP API 客户端
#[derive(Clone)]
pub struct AuthApi {
    transport: Arc<dyn Transport>,
}

impl AuthApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// 用登录方式载荷交换 token + user；token 或 user 缺失返回认证错误
    pub async fn exchange(&self, payload: &ProviderPayload) -> Result<(String, User)> {
        let provider = payload.provider();
        let body = match payload {
            ProviderPayload::Password { identifier, secret } => json!({
                "username": identifier,
                "password": secret,
            }),
            ProviderPayload::Google { id_token } => json!({ "id_token": id_token }),
            ProviderPayload::Github { code } => json!({ "code": code }),
            ProviderPayload::Telegram(auth) => serde_json::to_value(auth)?,
        };

        info!("[AuthAPI] 🔐 会话交换: {:?}", provider);
        let value = self
            .transport
            .request(ApiRequest::post(provider.endpoint()).json(body))
            .await
            .map_err(SdkError::into_auth)?;

        let session: SessionPayload = decode(value, "会话数据").map_err(SdkError::into_auth)?;
        match (session.token, session.user) {
            (Some(token), Some(user)) if !token.is_empty() => {
                debug!("[AuthAPI] ✅ 会话交换成功，用户ID: {}", user.id);
                Ok((token, user))
            }
            _ => Err(SdkError::auth("登录失败：服务器返回的会话数据不完整")),
        }
    }

    /// 获取当前用户
    pub async fn me(&self, token: &str) -> Result<User> {
        let value = self
            .transport
            .request(ApiRequest::get("me.php").bearer(token))
            .await?;
        decode(value, "当前用户")
    }

    /// 在线心跳
    pub async fn ping(&self, token: &str) -> Result<()> {
        self.transport
            .request(ApiRequest::post("ping.php").bearer(token))
            .await
            .map(|_| ())
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.transport
            .request(ApiRequest::post("logout.php").bearer(token))
            .await
            .map(|_| ())
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<()> {
        info!("[AuthAPI] 📝 注册用户: {}", req.username);
        self.transport
            .request(ApiRequest::post("register.php").json(serde_json::to_value(req)?))
            .await
            .map(|_| ())
    }

    pub async fn verify_code(&self, email: &str, code: &str, purpose: CodePurpose) -> Result<()> {
        self.transport
            .request(ApiRequest::post("verify_code.php").json(json!({
                "email": email,
                "code": code,
                "type": purpose.as_str(),
            })))
            .await
            .map(|_| ())
    }

    pub async fn resend_code(&self, email: &str, purpose: CodePurpose) -> Result<()> {
        self.transport
            .request(ApiRequest::post("resend_code.php").json(json!({
                "email": email,
                "type": purpose.as_str(),
            })))
            .await
            .map(|_| ())
    }

    pub async fn forgot_password(&self, identifier: &str) -> Result<ForgotPasswordResp> {
        let value = self
            .transport
            .request(
                ApiRequest::post("forgot_password.php").json(json!({ "identifier": identifier })),
            )
            .await?;
        decode(value, "找回密码")
    }

    pub async fn reset_password(&self, email: &str, code: &str, new_password: &str) -> Result<()> {
        self.transport
            .request(ApiRequest::post("reset_password.php").json(json!({
                "email": email,
                "code": code,
                "new_password": new_password,
            })))
            .await
            .map(|_| ())
    }
}
