//! 社交 API DTO（用户目录、资料、关注、帖子、点赞）

use crate::sdk::types::{
    deserialize_id, deserialize_lenient_bool, deserialize_lenient_i64, deserialize_vec_or_null,
    DEFAULT_AVATAR,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 用户目录 / 关注列表 / 点赞列表中的用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCard {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// 当前用户是否已关注
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub following: bool,
    /// 个人主页链接 token
    #[serde(default)]
    pub profile_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListResp {
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub users: Vec<UserCard>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsersCountResp {
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowersResp {
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub followers: Vec<UserCard>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowingResp {
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub following: Vec<UserCard>,
}

/// 个人主页
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub profile_image: String,
    pub last_seen: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub already_following: bool,
    pub bio: String,
}

impl Profile {
    /// 解析 `user_profile.php` 响应：用户字段可能在 `user` 中也可能在顶层，
    /// 计数优先取顶层
    pub fn from_value(value: &Value) -> Option<Self> {
        let user = value.get("user").filter(|u| u.is_object()).unwrap_or(value);
        let id = id_of(user.get("id")?)?;
        let text = |key: &str| user.get(key).and_then(Value::as_str).map(str::to_string);
        let count = |key: &str| {
            value
                .get(key)
                .or_else(|| user.get(key))
                .map(lenient_i64)
                .unwrap_or(0)
        };
        let already_following = value
            .get("is_following")
            .or_else(|| user.get("is_following"))
            .map(lenient_bool)
            .unwrap_or(false);

        Some(Self {
            id,
            username: text("username").unwrap_or_default(),
            name: text("name").unwrap_or_default(),
            email: text("email"),
            profile_image: text("profile_image_url")
                .or_else(|| text("profile_image"))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
            last_seen: text("last_seen"),
            followers: count("followers"),
            following: count("following"),
            already_following,
            bio: text("bio").unwrap_or_default(),
        })
    }
}

fn id_of(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_i64(v: &Value) -> i64 {
    match v {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

fn lenient_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    }
}

/// 帖子
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub likes_count: i64,
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub liked_by_me: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostsResp {
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub posts: Vec<Post>,
}

/// 点赞切换结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Added,
    Removed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactResp {
    pub action: LikeAction,
}

/// 待上传的图片
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// 新帖子
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub images: Vec<ImageUpload>,
}
