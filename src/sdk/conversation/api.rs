//! 私信 HTTP API 客户端
//!
//! 负责所有会话 / 消息相关的 HTTP 请求

use crate::sdk::conversation::types::{
    ConversationListResp, Message, MessagesResp, SendMessageResp, TypingStatusResp,
};
use crate::sdk::error::Result;
use crate::sdk::transport::{ApiRequest, Transport};
use crate::sdk::types::decode;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// 会话相关的 HTTP API 客户端
#[derive(Clone)]
pub struct ConversationApi {
    transport: Arc<dyn Transport>,
}

impl ConversationApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// 全量会话列表
    pub async fn list_conversations(&self, token: &str) -> Result<ConversationListResp> {
        let value = self
            .transport
            .request(ApiRequest::get("conversations_list.php").bearer(token))
            .await?;
        decode(value, "会话列表")
    }

    /// 打开会话时的历史消息
    pub async fn history(&self, token: &str, peer_id: i64, limit: u32) -> Result<Vec<Message>> {
        let req = ApiRequest::get("messages_history.php")
            .query([("peer_id", peer_id.to_string()), ("limit", limit.to_string())])
            .bearer(token);
        let value = self.transport.request(req).await?;
        let resp: MessagesResp = decode(value, "历史消息")?;
        Ok(resp.items)
    }

    /// 游标之后的新消息
    pub async fn messages_since(
        &self,
        token: &str,
        peer_id: i64,
        since_id: i64,
    ) -> Result<Vec<Message>> {
        let req = ApiRequest::get("messages_history.php")
            .query([("peer_id", peer_id), ("since_id", since_id)])
            .bearer(token);
        let value = self.transport.request(req).await?;
        let resp: MessagesResp = decode(value, "增量消息")?;
        Ok(resp.items)
    }

    pub async fn send(&self, token: &str, peer_id: i64, body: &str) -> Result<i64> {
        let value = self
            .transport
            .request(
                ApiRequest::post("messages_send.php")
                    .bearer(token)
                    .json(json!({ "peer_id": peer_id, "body": body })),
            )
            .await?;
        let resp: SendMessageResp = decode(value, "发送消息")?;
        Ok(resp.message_id)
    }

    /// 标记已读到 `last_id`
    pub async fn mark_read(&self, token: &str, peer_id: i64, last_id: i64) -> Result<()> {
        debug!("[ConvAPI] 标记已读 peer={} last_id={}", peer_id, last_id);
        self.transport
            .request(
                ApiRequest::post("messages_mark_read.php")
                    .bearer(token)
                    .form([
                        ("peer_id", peer_id.to_string()),
                        ("last_id", last_id.to_string()),
                    ]),
            )
            .await
            .map(|_| ())
    }

    pub async fn typing_status(&self, token: &str, peer_id: i64) -> Result<bool> {
        let req = ApiRequest::get("typing_status.php")
            .query([("peer_id", peer_id)])
            .bearer(token);
        let value = self.transport.request(req).await?;
        let resp: TypingStatusResp = decode(value, "输入状态")?;
        Ok(resp.typing)
    }

    pub async fn set_typing(&self, token: &str, peer_id: i64) -> Result<()> {
        self.transport
            .request(
                ApiRequest::post("typing_set.php")
                    .bearer(token)
                    .json(json!({ "peer_id": peer_id })),
            )
            .await
            .map(|_| ())
    }

    pub async fn delete_conversation(&self, token: &str, peer_id: i64) -> Result<()> {
        self.transport
            .request(
                ApiRequest::post("messages_delete_conversation.php")
                    .bearer(token)
                    .form([("peer_id", peer_id.to_string())]),
            )
            .await
            .map(|_| ())
    }

    /// 消息搜索；`peer_id` 为 None 时搜索所有会话
    pub async fn search(
        &self,
        token: &str,
        query: &str,
        peer_id: Option<i64>,
    ) -> Result<Vec<Message>> {
        let req = ApiRequest::get("messages_search.php")
            .query([("q", query)])
            .query(peer_id.map(|id| ("peer_id", id)))
            .bearer(token);
        let value = self.transport.request(req).await?;
        let resp: MessagesResp = decode(value, "消息搜索")?;
        Ok(resp.items)
    }
}
