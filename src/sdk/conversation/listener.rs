//! 会话监听器回调接口

use crate::sdk::conversation::types::{ConversationSummary, Message};
use async_trait::async_trait;

#[async_trait]
pub trait ConversationListener: Send + Sync {
    /// 会话列表整体刷新
    async fn on_conversation_list_changed(&self, conversations: Vec<ConversationSummary>);

    /// 当前会话追加了新消息（按到达顺序）
    async fn on_new_messages(&self, peer_id: i64, messages: Vec<Message>);

    /// 对方输入状态变更
    async fn on_peer_typing_changed(&self, peer_id: i64, typing: bool);
}

/// 空实现（默认监听器）
pub struct EmptyConversationListener;

#[async_trait]
impl ConversationListener for EmptyConversationListener {
    async fn on_conversation_list_changed(&self, _conversations: Vec<ConversationSummary>) {}
    async fn on_new_messages(&self, _peer_id: i64, _messages: Vec<Message>) {}
    async fn on_peer_typing_changed(&self, _peer_id: i64, _typing: bool) {}
}
