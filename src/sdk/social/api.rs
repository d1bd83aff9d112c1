//! 社交 HTTP API 客户端
//!
//! 负责用户目录、关注、帖子和点赞相关的 HTTP 请求

use crate::sdk::error::{Result, SdkError};
use crate::sdk::social::types::{
    FollowersResp, FollowingResp, LikeAction, NewPost, PostsResp, Profile, ReactResp, UserCard,
    UserListResp, UsersCountResp,
};
use crate::sdk::transport::{ApiRequest, MultipartField, Transport};
use crate::sdk::types::decode;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SocialApi {
    transport: Arc<dyn Transport>,
}

impl SocialApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn list_users(
        &self,
        token: &str,
        page: u32,
        per: u32,
        query: Option<&str>,
    ) -> Result<Vec<UserCard>> {
        let q = query.map(str::trim).filter(|q| !q.is_empty());
        let req = ApiRequest::get("users_list.php")
            .query([("page", page), ("per", per)])
            .query(q.map(|q| ("q", q)))
            .bearer(token);
        let value = self.transport.request(req).await?;
        let resp: UserListResp = decode(value, "用户列表")?;
        Ok(resp.users)
    }

    pub async fn users_count(&self, token: &str) -> Result<i64> {
        let value = self
            .transport
            .request(ApiRequest::get("users_count.php").bearer(token))
            .await?;
        let resp: UsersCountResp = decode(value, "用户数")?;
        Ok(resp.count)
    }

    pub async fn user_profile(&self, token: &str, profile_token: &str) -> Result<Profile> {
        let req = ApiRequest::get("user_profile.php")
            .query([("t", profile_token)])
            .bearer(token);
        let value = self.transport.request(req).await?;
        Profile::from_value(&value).ok_or_else(|| SdkError::Decode("用户资料缺少 id".into()))
    }

    pub async fn follow_toggle(&self, token: &str, target_id: i64) -> Result<()> {
        debug!("[SocialAPI] 切换关注 target={}", target_id);
        self.transport
            .request(
                ApiRequest::post("follow_toggle.php")
                    .bearer(token)
                    .json(json!({ "target_id": target_id })),
            )
            .await
            .map(|_| ())
    }

    pub async fn followers(
        &self,
        token: &str,
        user_id: i64,
        page: u32,
        per: u32,
    ) -> Result<Vec<UserCard>> {
        let req = ApiRequest::get("user_followers.php")
            .query([("id", user_id)])
            .query([("page", page), ("per", per)])
            .bearer(token);
        let value = self.transport.request(req).await?;
        let resp: FollowersResp = decode(value, "粉丝列表")?;
        Ok(resp.followers)
    }

    pub async fn following(
        &self,
        token: &str,
        user_id: i64,
        page: u32,
        per: u32,
    ) -> Result<Vec<UserCard>> {
        let req = ApiRequest::get("user_following.php")
            .query([("id", user_id)])
            .query([("page", page), ("per", per)])
            .bearer(token);
        let value = self.transport.request(req).await?;
        let resp: FollowingResp = decode(value, "关注列表")?;
        Ok(resp.following)
    }

    /// 发帖（multipart：title、body、images[]）
    pub async fn create_post(&self, token: &str, post: NewPost) -> Result<()> {
        let mut fields = vec![
            MultipartField::Text {
                name: "title".into(),
                value: post.title.trim().to_string(),
            },
            MultipartField::Text {
                name: "body".into(),
                value: post.body.trim().to_string(),
            },
        ];
        for image in post.images {
            fields.push(MultipartField::File {
                name: "images[]".into(),
                file_name: image.file_name,
                mime: image.mime,
                bytes: image.bytes,
            });
        }
        self.transport
            .request(ApiRequest::post("post_create.php").bearer(token).multipart(fields))
            .await
            .map(|_| ())
    }

    pub async fn user_posts(
        &self,
        token: &str,
        profile_token: &str,
        page: u32,
        per: u32,
    ) -> Result<PostsResp> {
        let req = ApiRequest::get("user_posts.php")
            .query([("t", profile_token)])
            .query([("page", page), ("per", per)])
            .bearer(token);
        let value = self.transport.request(req).await?;
        decode(value, "帖子列表")
    }

    pub async fn react(&self, token: &str, post_id: i64) -> Result<LikeAction> {
        let value = self
            .transport
            .request(
                ApiRequest::post("post_react.php")
                    .bearer(token)
                    .json(json!({ "post_id": post_id })),
            )
            .await?;
        let resp: ReactResp = decode(value, "点赞")?;
        Ok(resp.action)
    }

    pub async fn likes(&self, token: &str, post_id: i64) -> Result<Vec<UserCard>> {
        let req = ApiRequest::get("post_likes_list.php")
            .query([("post_id", post_id)])
            .bearer(token);
        let value = self.transport.request(req).await?;
        let resp: UserListResp = decode(value, "点赞列表")?;
        Ok(resp.users)
    }
}
