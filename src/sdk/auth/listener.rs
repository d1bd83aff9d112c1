//! 会话监听器回调接口

use crate::sdk::auth::types::SessionSnapshot;
use async_trait::async_trait;

#[async_trait]
pub trait SessionListener: Send + Sync {
    /// token / 用户 / 状态发生变化
    async fn on_session_changed(&self, snapshot: SessionSnapshot);

    /// 服务器拒绝了已保存的 token，会话已被清除
    async fn on_session_expired(&self, reason: String);
}

/// 空实现（默认监听器）
pub struct EmptySessionListener;

#[async_trait]
impl SessionListener for EmptySessionListener {
    async fn on_session_changed(&self, _snapshot: SessionSnapshot) {}
    async fn on_session_expired(&self, _reason: String) {}
}
