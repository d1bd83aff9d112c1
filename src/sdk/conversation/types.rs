//! 会话 API DTO（请求和响应结构体）

use crate::sdk::types::{
    deserialize_id, deserialize_lenient_bool, deserialize_lenient_i64, deserialize_vec_or_null,
    DEFAULT_AVATAR,
};
use serde::{Deserialize, Serialize};

/// 服务器返回的会话行，同时包含双方（a / b）的信息
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationRow {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub a_id: i64,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub b_id: i64,
    #[serde(default)]
    pub a_name: Option<String>,
    #[serde(default)]
    pub a_username: Option<String>,
    #[serde(default)]
    pub a_img: Option<String>,
    #[serde(default)]
    pub b_name: Option<String>,
    #[serde(default)]
    pub b_username: Option<String>,
    #[serde(default)]
    pub b_img: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub unread: i64,
    /// 对方是否已读我最后一条消息
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub seen_my_last: bool,
    #[serde(default)]
    pub last_time: Option<String>,
    #[serde(default)]
    pub last_body: Option<String>,
}

/// 会话摘要（相对当前用户取对方一侧）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: i64,
    pub peer_id: i64,
    pub title: String,
    pub avatar: String,
    pub unread: i64,
    pub seen_my_last: bool,
    pub last_time: Option<String>,
    pub last_message: String,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

impl ConversationSummary {
    pub fn from_row(row: &ConversationRow, my_id: i64) -> Self {
        let i_am_a = row.a_id == my_id;
        let (peer_id, name, username, img) = if i_am_a {
            (row.b_id, &row.b_name, &row.b_username, &row.b_img)
        } else {
            (row.a_id, &row.a_name, &row.a_username, &row.a_img)
        };
        let title = non_empty(name)
            .or_else(|| non_empty(username))
            .map(str::to_string)
            .unwrap_or_else(|| format!("ID {}", peer_id));
        Self {
            conversation_id: row.id,
            peer_id,
            title,
            avatar: non_empty(img).unwrap_or(DEFAULT_AVATAR).to_string(),
            unread: row.unread,
            seen_my_last: row.seen_my_last,
            last_time: row.last_time.clone(),
            last_message: row.last_body.clone().unwrap_or_default(),
        }
    }
}

/// 会话列表响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationListResp {
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub items: Vec<ConversationRow>,
}

/// 单条私信；id 在会话内随发送顺序单调递增，用作同步游标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(deserialize_with = "deserialize_id")]
    pub sender_id: i64,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub receiver_id: i64,
    #[serde(default)]
    pub body: String,
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub files: Vec<serde_json::Value>,
    #[serde(default)]
    pub created_at: String,
}

/// 历史消息 / 增量消息 / 搜索响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesResp {
    #[serde(default, deserialize_with = "deserialize_vec_or_null")]
    pub items: Vec<Message>,
}

/// 发送消息响应
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResp {
    #[serde(deserialize_with = "deserialize_id")]
    pub message_id: i64,
}

/// 输入状态响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypingStatusResp {
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub typing: bool,
}

/// 一次轮询的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOutcome {
    /// 本次追加的新消息数
    pub appended: usize,
    /// 对方是否正在输入
    pub peer_typing: bool,
}
