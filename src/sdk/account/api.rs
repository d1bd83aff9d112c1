//! 账户设置 HTTP API 客户端

use crate::sdk::account::types::{
    AvailabilityResp, AvatarResp, AvatarUpload, UpdateNameResp, UpdateUsernameResp,
};
use crate::sdk::error::Result;
use crate::sdk::transport::{ApiRequest, MultipartField, Transport};
use crate::sdk::types::decode;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct AccountApi {
    transport: Arc<dyn Transport>,
}

impl AccountApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn post_json(&self, path: &str, token: &str, body: Value) -> Result<Value> {
        self.transport
            .request(ApiRequest::post(path).bearer(token).json(body))
            .await
    }

    async fn post_empty(&self, path: &str, token: &str) -> Result<()> {
        self.transport
            .request(ApiRequest::post(path).bearer(token))
            .await
            .map(|_| ())
    }

    pub async fn username_check(&self, token: &str, username: &str) -> Result<bool> {
        let value = self
            .post_json("username_check.php", token, json!({ "username": username }))
            .await?;
        let resp: AvailabilityResp = decode(value, "用户名检查")?;
        Ok(resp.available)
    }

    pub async fn email_check(&self, token: &str, email: &str) -> Result<bool> {
        let value = self
            .post_json("email_check.php", token, json!({ "email": email }))
            .await?;
        let resp: AvailabilityResp = decode(value, "邮箱检查")?;
        Ok(resp.available)
    }

    pub async fn update_username(&self, token: &str, username: &str) -> Result<String> {
        let value = self
            .post_json("update_username.php", token, json!({ "username": username }))
            .await?;
        let resp: UpdateUsernameResp = decode(value, "修改用户名")?;
        Ok(resp.username)
    }

    pub async fn update_name(&self, token: &str, name: &str) -> Result<UpdateNameResp> {
        let value = self
            .post_json("update_name.php", token, json!({ "name": name }))
            .await?;
        decode(value, "修改姓名")
    }

    pub async fn upload_avatar(&self, token: &str, avatar: AvatarUpload) -> Result<String> {
        let field = MultipartField::File {
            name: "avatar".into(),
            file_name: avatar.file_name,
            mime: avatar.mime,
            bytes: avatar.bytes,
        };
        let value = self
            .transport
            .request(
                ApiRequest::post("upload_avatar.php")
                    .bearer(token)
                    .multipart(vec![field]),
            )
            .await?;
        let resp: AvatarResp = decode(value, "上传头像")?;
        Ok(resp.profile_image_url)
    }

    pub async fn password_change_check(&self, token: &str, current: &str) -> Result<()> {
        self.post_json(
            "password_change_check.php",
            token,
            json!({ "current_password": current }),
        )
        .await
        .map(|_| ())
    }

    pub async fn password_change_send_code(&self, token: &str) -> Result<()> {
        self.post_empty("password_change_send_code.php", token).await
    }

    pub async fn password_change_confirm(
        &self,
        token: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()> {
        self.post_json(
            "password_change_confirm.php",
            token,
            json!({ "code": code, "new_password": new_password }),
        )
        .await
        .map(|_| ())
    }

    pub async fn email_change_request(&self, token: &str) -> Result<()> {
        self.post_empty("email_change_request.php", token).await
    }

    pub async fn email_change_confirm(
        &self,
        token: &str,
        new_email: &str,
        code: &str,
    ) -> Result<()> {
        self.post_json(
            "email_change_confirm.php",
            token,
            json!({ "new_email": new_email, "code": code }),
        )
        .await
        .map(|_| ())
    }
}
