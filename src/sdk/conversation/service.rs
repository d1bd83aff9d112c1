//! 私信同步服务层
//!
//! 没有推送通道，全部依靠短间隔轮询：
//! - 会话列表：挂载期间每 ~2 秒全量刷新，整体替换本地列表
//! - 当前会话：每 ~1 秒按游标（since_id）拉取新消息，同时查询对方输入状态
//!
//! 读路径的失败只记录日志，等下一次 tick 重试；写路径（发送、删除）的失败返回给调用方，
//! 且不破坏本地状态。
//!
//! 同步器绑定到启动时的 token。会话被清除（退出登录、修改密码、过期）或换了账号后，
//! 下一次 tick 会清空会话列表和当前会话并停止全部轮询，直到重新 `start`。

use crate::sdk::auth::SessionManager;
use crate::sdk::conversation::api::ConversationApi;
use crate::sdk::conversation::listener::{ConversationListener, EmptyConversationListener};
use crate::sdk::conversation::models::{ActiveConversation, ConversationSyncerConfig};
use crate::sdk::conversation::types::{ConversationSummary, Message, PollOutcome};
use crate::sdk::error::{Result, SdkError};
use crate::sdk::lock;
use crate::sdk::scheduler::ScheduledTask;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Default)]
struct SyncState {
    conversations: Vec<ConversationSummary>,
    active: Option<ActiveConversation>,
    generation: u64,
    sending: bool,
    deleting: bool,
    last_typing_sent: Option<Instant>,
    /// 当前状态所属的 token
    bound_token: Option<String>,
}

/// 轮询任务与公开方法共享的部分
struct SyncInner {
    api: ConversationApi,
    session: Arc<SessionManager>,
    listener: Arc<dyn ConversationListener>,
    config: ConversationSyncerConfig,
    state: Mutex<SyncState>,
    list_task: Mutex<Option<ScheduledTask>>,
    active_task: Mutex<Option<ScheduledTask>>,
}

/// 私信同步器
pub struct ConversationSynchronizer {
    inner: Arc<SyncInner>,
}

/// 发送中标记，离开作用域时复位
struct SendingGuard<'a>(&'a Mutex<SyncState>);

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).sending = false;
    }
}

struct DeletingGuard<'a>(&'a Mutex<SyncState>);

impl Drop for DeletingGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).deleting = false;
    }
}

impl SyncInner {
    /// token 与绑定的不一致时清空状态、停止轮询；返回是否发生了清空
    fn drop_stale_session(&self) -> bool {
        let current = self.session.token();
        {
            let mut state = lock(&self.state);
            if state.bound_token.is_none() || state.bound_token == current {
                return false;
            }
            state.active = None;
            state.conversations.clear();
            state.generation += 1;
            state.last_typing_sent = None;
            state.bound_token = None;
        }
        info!("[ConvSync] 🔒 登录状态已变化，清空私信状态并停止轮询");
        self.cancel_list_task();
        self.cancel_active_task();
        true
    }

    /// 公开操作使用：必要时丢弃旧账号的状态，并绑定到当前 token
    fn token(&self) -> Result<String> {
        self.drop_stale_session();
        let token = self
            .session
            .token()
            .ok_or_else(|| SdkError::auth("未登录"))?;
        lock(&self.state).bound_token = Some(token.clone());
        Ok(token)
    }

    /// 轮询 tick 使用：token 变了就不再发请求
    fn tick_token(&self) -> Result<String> {
        if self.drop_stale_session() {
            return Err(SdkError::auth("登录状态已变化"));
        }
        self.session
            .token()
            .ok_or_else(|| SdkError::auth("未登录"))
    }

    fn cancel_list_task(&self) {
        if let Some(task) = lock(&self.list_task).take() {
            task.cancel();
        }
    }

    fn cancel_active_task(&self) {
        if let Some(task) = lock(&self.active_task).take() {
            task.cancel();
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        lock(&self.state)
            .active
            .as_ref()
            .map(|a| a.generation == generation)
            .unwrap_or(false)
    }

    async fn refresh_conversation_list(&self, token: String) -> Result<Vec<ConversationSummary>> {
        let my_id = self.session.current_user_id();
        let resp = self.api.list_conversations(&token).await?;
        let summaries: Vec<ConversationSummary> = resp
            .items
            .iter()
            .map(|row| ConversationSummary::from_row(row, my_id))
            .collect();

        {
            let mut state = lock(&self.state);
            // 请求期间换了账号，结果不属于当前用户
            if state.bound_token.as_deref() != Some(token.as_str()) {
                return Err(SdkError::auth("登录状态已变化"));
            }
            state.conversations = summaries.clone();
        }
        debug!("[ConvSync] 会话列表已刷新，共 {} 个", summaries.len());
        self.listener
            .on_conversation_list_changed(summaries.clone())
            .await;
        Ok(summaries)
    }

    /// 标记已读，不等待结果，失败忽略
    fn mark_read_detached(&self, token: String, peer_id: i64, last_id: i64) {
        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.mark_read(&token, peer_id, last_id).await {
                debug!("[ConvSync] 标记已读失败（忽略）: {}", e);
            }
        });
    }

    /// 当前会话的一次 tick：增量消息 + 输入状态，两个请求互不影响
    async fn poll_active(&self, token: String) -> Result<PollOutcome> {
        let (peer_id, cursor, generation) = {
            let state = lock(&self.state);
            match state.active.as_ref() {
                Some(active) => (active.peer_id, active.cursor, active.generation),
                None => return Ok(PollOutcome::default()),
            }
        };
        let my_id = self.session.current_user_id();

        let (messages, typing) = futures_util::future::join(
            self.api.messages_since(&token, peer_id, cursor),
            self.api.typing_status(&token, peer_id),
        )
        .await;

        let incoming = messages.unwrap_or_else(|e| {
            debug!("[ConvSync] 拉取新消息失败，下次重试: {}", e);
            Vec::new()
        });
        let peer_typing = typing.unwrap_or_else(|e| {
            debug!("[ConvSync] 查询输入状态失败，按未输入处理: {}", e);
            false
        });

        let (appended, typing_changed) = {
            let mut state = lock(&self.state);
            match state.active.as_mut() {
                Some(active) if active.generation == generation => {
                    let appended = active.append(incoming);
                    let changed = active.peer_typing != peer_typing;
                    active.peer_typing = peer_typing;
                    (appended, changed)
                }
                // 会话已关闭或切换，丢弃结果
                _ => return Ok(PollOutcome::default()),
            }
        };

        if let Some(last_from_peer) = appended.iter().rev().find(|m| m.sender_id != my_id) {
            self.mark_read_detached(token, peer_id, last_from_peer.id);
        }

        let outcome = PollOutcome {
            appended: appended.len(),
            peer_typing,
        };
        if !appended.is_empty() {
            info!(
                "[ConvSync] 📨 会话 {} 收到 {} 条新消息",
                peer_id,
                appended.len()
            );
            self.listener.on_new_messages(peer_id, appended).await;
        }
        if typing_changed {
            self.listener
                .on_peer_typing_changed(peer_id, peer_typing)
                .await;
        }
        Ok(outcome)
    }
}

impl ConversationSynchronizer {
    /// 创建同步器（使用默认空监听器）
    pub fn new(
        api: ConversationApi,
        session: Arc<SessionManager>,
        config: ConversationSyncerConfig,
    ) -> Self {
        Self::with_listener(api, session, config, Arc::new(EmptyConversationListener))
    }

    /// 创建同步器（带自定义监听器）
    pub fn with_listener(
        api: ConversationApi,
        session: Arc<SessionManager>,
        config: ConversationSyncerConfig,
        listener: Arc<dyn ConversationListener>,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                api,
                session,
                listener,
                config,
                state: Mutex::new(SyncState::default()),
                list_task: Mutex::new(None),
                active_task: Mutex::new(None),
            }),
        }
    }

    /// 挂载：绑定当前 token 并启动会话列表轮询（立即执行第一次）。
    /// 换了账号时先丢弃上一个账号的状态
    pub fn start(&self) {
        if let Err(e) = self.inner.token() {
            debug!("[ConvSync] 未登录，不启动轮询: {}", e);
            return;
        }
        let mut slot = lock(&self.inner.list_task);
        if slot.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }
        info!("[ConvSync] 🔄 启动会话列表轮询");
        let inner = self.inner.clone();
        *slot = Some(ScheduledTask::immediate(
            "conversation-list",
            self.inner.config.list_interval,
            move || {
                let inner = inner.clone();
                async move {
                    let refreshed = match inner.tick_token() {
                        Ok(token) => inner.refresh_conversation_list(token).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = refreshed {
                        debug!("[ConvSync] 刷新会话列表失败，下次重试: {}", e);
                    }
                }
            },
        ));
    }

    /// 卸载：取消全部轮询并关闭当前会话
    pub fn stop(&self) {
        self.inner.cancel_list_task();
        self.close_conversation();
        info!("[ConvSync] ⏹️ 已停止同步");
    }

    /// 全量刷新会话列表，整体替换本地状态
    pub async fn refresh_conversation_list(&self) -> Result<Vec<ConversationSummary>> {
        let token = self.inner.token()?;
        self.inner.refresh_conversation_list(token).await
    }

    /// 打开会话：重置消息与游标，拉取历史，游标设为最大 ID，标记已读，然后开始轮询
    pub async fn open_conversation(&self, peer_id: i64) -> Result<()> {
        if peer_id <= 0 {
            return Err(SdkError::validation("无效的会话对象"));
        }
        if self.active_peer() == Some(peer_id) {
            return Ok(());
        }
        let token = self.inner.token()?;

        self.inner.cancel_active_task();
        let generation = {
            let mut state = lock(&self.inner.state);
            state.generation += 1;
            state.last_typing_sent = None;
            let generation = state.generation;
            state.active = Some(ActiveConversation::new(peer_id, generation));
            generation
        };
        info!("[ConvSync] 💬 打开会话 peer={}", peer_id);

        let result = match self
            .inner
            .api
            .history(&token, peer_id, self.inner.config.history_limit)
            .await
        {
            Ok(items) => {
                let loaded = {
                    let mut state = lock(&self.inner.state);
                    match state.active.as_mut() {
                        Some(active) if active.generation == generation => {
                            active.messages.clear();
                            active.cursor = 0;
                            Some((active.append(items), active.cursor))
                        }
                        _ => None,
                    }
                };
                if let Some((history, cursor)) = loaded {
                    debug!(
                        "[ConvSync] 历史消息 {} 条，游标 {}",
                        history.len(),
                        cursor
                    );
                    if cursor > 0 {
                        self.inner.mark_read_detached(token, peer_id, cursor);
                    }
                    if !history.is_empty() {
                        self.inner.listener.on_new_messages(peer_id, history).await;
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!("[ConvSync] 拉取历史消息失败 peer={}: {}", peer_id, e);
                Err(e)
            }
        };

        if self.inner.is_current(generation) {
            self.start_active_task();
        }
        result
    }

    /// 当前会话的一次轮询（定时任务也调用它）
    pub async fn poll_active_conversation(&self) -> Result<PollOutcome> {
        let token = self.inner.token()?;
        self.inner.poll_active(token).await
    }

    /// 发送消息；空内容和重复发送直接拒绝
    pub async fn send_message(&self, body: &str) -> Result<Message> {
        let body = body.trim();
        if body.is_empty() {
            return Err(SdkError::validation("消息内容不能为空"));
        }
        let token = self.inner.token()?;
        let (peer_id, generation) = {
            let mut state = lock(&self.inner.state);
            let (peer_id, generation) = match state.active.as_ref() {
                Some(active) => (active.peer_id, active.generation),
                None => return Err(SdkError::validation("没有打开的会话")),
            };
            if state.sending {
                return Err(SdkError::validation("消息正在发送中"));
            }
            state.sending = true;
            (peer_id, generation)
        };
        let _guard = SendingGuard(&self.inner.state);

        let message_id = self.inner.api.send(&token, peer_id, body).await?;
        let message = Message {
            id: message_id,
            sender_id: self.inner.session.current_user_id(),
            receiver_id: peer_id,
            body: body.to_string(),
            files: Vec::new(),
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        info!("[ConvSync] 📤 消息已发送 peer={} id={}", peer_id, message_id);

        let appended = {
            let mut state = lock(&self.inner.state);
            match state.active.as_mut() {
                Some(active) if active.generation == generation => {
                    active.append(vec![message.clone()])
                }
                _ => Vec::new(),
            }
        };
        if !appended.is_empty() {
            self.inner.listener.on_new_messages(peer_id, appended).await;
        }

        // 刷新列表以更新未读 / 已读标记
        if let Err(e) = self.inner.refresh_conversation_list(token).await {
            debug!("[ConvSync] 发送后刷新会话列表失败（忽略）: {}", e);
        }
        Ok(message)
    }

    /// 关闭当前会话并取消其轮询
    pub fn close_conversation(&self) {
        self.inner.cancel_active_task();
        let mut state = lock(&self.inner.state);
        if let Some(active) = state.active.take() {
            debug!("[ConvSync] 关闭会话 peer={}", active.peer_id);
            state.generation += 1;
            state.last_typing_sent = None;
        }
    }

    /// 通知对方“正在输入”；节流，发送不等待结果。返回是否实际发出
    pub fn notify_typing(&self) -> bool {
        let Ok(token) = self.inner.token() else {
            return false;
        };
        let peer_id = {
            let mut state = lock(&self.inner.state);
            let Some(peer_id) = state.active.as_ref().map(|a| a.peer_id) else {
                return false;
            };
            let now = Instant::now();
            if let Some(last) = state.last_typing_sent {
                if now.duration_since(last) < self.inner.config.typing_throttle {
                    return false;
                }
            }
            state.last_typing_sent = Some(now);
            peer_id
        };

        let api = self.inner.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.set_typing(&token, peer_id).await {
                debug!("[ConvSync] 发送输入状态失败（忽略）: {}", e);
            }
        });
        true
    }

    /// 删除当前会话
    pub async fn delete_conversation(&self) -> Result<()> {
        let token = self.inner.token()?;
        let peer_id = {
            let mut state = lock(&self.inner.state);
            let peer_id = match state.active.as_ref() {
                Some(active) => active.peer_id,
                None => return Err(SdkError::validation("没有打开的会话")),
            };
            if state.deleting {
                return Err(SdkError::validation("正在删除会话"));
            }
            state.deleting = true;
            peer_id
        };
        let _guard = DeletingGuard(&self.inner.state);

        self.inner.api.delete_conversation(&token, peer_id).await?;
        info!("[ConvSync] 🗑️ 会话已删除 peer={}", peer_id);

        lock(&self.inner.state)
            .conversations
            .retain(|c| c.peer_id != peer_id);
        self.close_conversation();
        if let Err(e) = self.inner.refresh_conversation_list(token).await {
            debug!("[ConvSync] 删除后刷新会话列表失败（忽略）: {}", e);
        }
        Ok(())
    }

    /// 搜索消息；打开会话时只搜索该会话
    pub async fn search_messages(&self, query: &str) -> Result<Vec<Message>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let token = self.inner.token()?;
        self.inner.api.search(&token, query, self.active_peer()).await
    }

    pub fn conversations(&self) -> Vec<ConversationSummary> {
        lock(&self.inner.state).conversations.clone()
    }

    pub fn total_unread(&self) -> i64 {
        lock(&self.inner.state)
            .conversations
            .iter()
            .map(|c| c.unread)
            .sum()
    }

    pub fn active_peer(&self) -> Option<i64> {
        lock(&self.inner.state).active.as_ref().map(|a| a.peer_id)
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.inner.state)
            .active
            .as_ref()
            .map(|a| a.messages.clone())
            .unwrap_or_default()
    }

    pub fn cursor(&self) -> i64 {
        lock(&self.inner.state)
            .active
            .as_ref()
            .map(|a| a.cursor)
            .unwrap_or(0)
    }

    pub fn peer_typing(&self) -> bool {
        lock(&self.inner.state)
            .active
            .as_ref()
            .map(|a| a.peer_typing)
            .unwrap_or(false)
    }

    pub fn is_sending(&self) -> bool {
        lock(&self.inner.state).sending
    }

    fn start_active_task(&self) {
        let inner = self.inner.clone();
        let task = ScheduledTask::every(
            "active-conversation",
            self.inner.config.active_interval,
            move || {
                let inner = inner.clone();
                async move {
                    let polled = match inner.tick_token() {
                        Ok(token) => inner.poll_active(token).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = polled {
                        debug!("[ConvSync] 当前会话轮询失败，下次重试: {}", e);
                    }
                }
            },
        );
        *lock(&self.inner.active_task) = Some(task);
    }
}

impl Drop for ConversationSynchronizer {
    fn drop(&mut self) {
        // 任务持有 inner 的引用，必须显式取消
        self.inner.cancel_list_task();
        self.inner.cancel_active_task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::auth::AuthApi;
    use crate::sdk::storage::MemoryTokenStore;
    use crate::sdk::testing::{init_test_logger, query_param, MockTransport};
    use crate::sdk::transport::RequestBody;
    use serde_json::json;
    use std::time::Duration;

    async fn setup() -> (Arc<MockTransport>, ConversationSynchronizer) {
        init_test_logger();
        let transport = MockTransport::new();
        transport.ok(
            "login.php",
            json!({ "token": "abc", "user": { "id": 1, "username": "alice" } }),
        );
        transport.ok("me.php", json!({ "id": 1, "username": "alice" }));
        transport.ok("ping.php", json!({}));
        transport.ok("logout.php", json!({}));
        transport.ok("messages_mark_read.php", json!({}));
        transport.ok("typing_status.php", json!({ "typing": false }));
        transport.ok("conversations_list.php", json!({ "items": [] }));

        let session = Arc::new(SessionManager::new(
            AuthApi::new(transport.clone()),
            Arc::new(MemoryTokenStore::new()),
            Duration::from_secs(30),
        ));
        session.login("alice", "secret123").await.unwrap();

        let sync = ConversationSynchronizer::new(
            ConversationApi::new(transport.clone()),
            session,
            ConversationSyncerConfig::default(),
        );
        transport.reset_calls();
        (transport, sync)
    }

    fn msg(id: i64, sender: i64) -> serde_json::Value {
        json!({
            "id": id,
            "sender_id": sender,
            "receiver_id": if sender == 1 { 42 } else { 1 },
            "body": format!("m{}", id),
            "created_at": "2025-01-01 10:00:00"
        })
    }

    /// 让分离的任务（标记已读、输入状态）执行完
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn open_sets_cursor_and_poll_advances_it() {
        let (transport, sync) = setup().await;
        transport.on("messages_history.php", |req| {
            match query_param(req, "since_id").as_deref() {
                None => Ok(json!({ "items": [msg(5, 42), msg(7, 1)] })),
                Some("7") => Ok(json!({ "items": [msg(9, 42)] })),
                Some(_) => Ok(json!({ "items": [] })),
            }
        });

        sync.open_conversation(42).await.unwrap();
        assert_eq!(sync.cursor(), 7);
        assert_eq!(sync.messages().len(), 2);

        let outcome = sync.poll_active_conversation().await.unwrap();
        assert_eq!(outcome.appended, 1);
        assert_eq!(sync.cursor(), 9);
        let ids: Vec<i64> = sync.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![5, 7, 9]);

        settle().await;
        let marks = transport.calls_to("messages_mark_read.php");
        assert_eq!(marks.len(), 2);
        assert_eq!(
            marks[0].body,
            RequestBody::Form(vec![
                ("peer_id".into(), "42".into()),
                ("last_id".into(), "7".into())
            ])
        );
        assert_eq!(
            marks[1].body,
            RequestBody::Form(vec![
                ("peer_id".into(), "42".into()),
                ("last_id".into(), "9".into())
            ])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_poll_with_same_cursor_appends_nothing() {
        let (transport, sync) = setup().await;
        transport.on("messages_history.php", |req| {
            match query_param(req, "since_id").as_deref() {
                None => Ok(json!({ "items": [msg(5, 42)] })),
                // 服务器重复投递已见过的消息
                Some(_) => Ok(json!({ "items": [msg(5, 42)] })),
            }
        });

        sync.open_conversation(42).await.unwrap();
        assert_eq!(sync.poll_active_conversation().await.unwrap().appended, 0);
        assert_eq!(sync.poll_active_conversation().await.unwrap().appended, 0);
        assert_eq!(sync.messages().len(), 1);
        assert_eq!(sync.cursor(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn own_messages_do_not_trigger_mark_read() {
        let (transport, sync) = setup().await;
        transport.on("messages_history.php", |req| {
            match query_param(req, "since_id").as_deref() {
                None => Ok(json!({ "items": [] })),
                Some(_) => Ok(json!({ "items": [msg(3, 1)] })),
            }
        });

        sync.open_conversation(42).await.unwrap();
        assert_eq!(sync.cursor(), 0);
        assert_eq!(sync.poll_active_conversation().await.unwrap().appended, 1);
        settle().await;
        assert_eq!(transport.count("messages_mark_read.php"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_all_requests_for_peer() {
        let (transport, sync) = setup().await;
        transport.ok("messages_history.php", json!({ "items": [msg(5, 42)] }));

        sync.open_conversation(42).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let polls_while_open = transport.count("typing_status.php");
        assert_eq!(polls_while_open, 2);

        sync.close_conversation();
        transport.reset_calls();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(transport.count("messages_history.php"), 0);
        assert_eq!(transport.count("typing_status.php"), 0);
        assert_eq!(sync.active_peer(), None);
        assert!(sync.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn typing_failure_does_not_block_message_poll() {
        let (transport, sync) = setup().await;
        transport.on("messages_history.php", |req| {
            match query_param(req, "since_id").as_deref() {
                None => Ok(json!({ "items": [] })),
                Some(_) => Ok(json!({ "items": [msg(11, 42)] })),
            }
        });
        transport.ok("typing_status.php", json!({ "typing": true }));

        sync.open_conversation(42).await.unwrap();
        let outcome = sync.poll_active_conversation().await.unwrap();
        assert!(outcome.peer_typing);
        assert!(sync.peer_typing());

        transport.fail("typing_status.php", 500, "down");
        transport.on("messages_history.php", |_| Ok(json!({ "items": [msg(12, 42)] })));
        let outcome = sync.poll_active_conversation().await.unwrap();
        assert_eq!(outcome.appended, 1);
        assert!(!outcome.peer_typing);
        assert!(!sync.peer_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn message_poll_failure_is_swallowed() {
        let (transport, sync) = setup().await;
        transport.ok("messages_history.php", json!({ "items": [msg(5, 42)] }));
        sync.open_conversation(42).await.unwrap();

        transport.fail("messages_history.php", 503, "busy");
        let outcome = sync.poll_active_conversation().await.unwrap();
        assert_eq!(outcome.appended, 0);
        assert_eq!(sync.cursor(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_message_is_rejected_without_network() {
        let (transport, sync) = setup().await;
        transport.ok("messages_history.php", json!({ "items": [msg(5, 42)] }));
        sync.open_conversation(42).await.unwrap();
        settle().await;
        transport.reset_calls();

        for body in ["", "   ", "\n\t"] {
            let err = sync.send_message(body).await.unwrap_err();
            assert!(matches!(err, SdkError::Validation(_)));
        }
        assert!(transport.calls().is_empty());
        assert_eq!(sync.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_appends_optimistic_message_and_refreshes_list() {
        let (transport, sync) = setup().await;
        transport.ok("messages_history.php", json!({ "items": [msg(5, 42)] }));
        transport.ok("messages_send.php", json!({ "message_id": 8 }));
        sync.open_conversation(42).await.unwrap();
        settle().await;
        transport.reset_calls();

        let sent = sync.send_message("  salom  ").await.unwrap();

        assert_eq!(sent.id, 8);
        assert_eq!(sent.body, "salom");
        assert_eq!(sent.sender_id, 1);
        assert!(sent.created_at.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&sent.created_at).is_ok());
        assert_eq!(sync.cursor(), 8);
        assert_eq!(sync.messages().last().unwrap().id, 8);
        assert!(!sync.is_sending());
        assert_eq!(transport.count("conversations_list.php"), 1);
        assert_eq!(
            transport.calls_to("messages_send.php")[0].body,
            RequestBody::Json(json!({ "peer_id": 42, "body": "salom" }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn send_is_not_reentrant() {
        let (transport, sync) = setup().await;
        transport.ok("messages_history.php", json!({ "items": [] }));
        transport.ok("messages_send.php", json!({ "message_id": 8 }));
        sync.open_conversation(42).await.unwrap();

        lock(&sync.inner.state).sending = true;
        let err = sync.send_message("ikkinchi").await.unwrap_err();
        assert_eq!(err, SdkError::validation("消息正在发送中"));
        assert_eq!(transport.count("messages_send.php"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_surfaces_error_and_keeps_state() {
        let (transport, sync) = setup().await;
        transport.ok("messages_history.php", json!({ "items": [msg(5, 42)] }));
        transport.fail("messages_send.php", 403, "Siz bloklangansiz");
        sync.open_conversation(42).await.unwrap();

        let err = sync.send_message("salom").await.unwrap_err();

        assert_eq!(err.user_message(), "Siz bloklangansiz");
        assert_eq!(sync.cursor(), 5);
        assert_eq!(sync.messages().len(), 1);
        assert!(!sync.is_sending());
    }

    #[tokio::test(start_paused = true)]
    async fn list_polling_replaces_list_until_stopped() {
        let (transport, sync) = setup().await;
        transport.ok(
            "conversations_list.php",
            json!({ "items": [
                { "id": 1, "a_id": 1, "b_id": 42, "b_username": "bob", "unread": 2 },
                { "id": 2, "a_id": 7, "b_id": 1, "a_name": "Vali", "unread": 1 }
            ] }),
        );

        sync.start();
        settle().await;
        assert_eq!(sync.conversations().len(), 2);
        assert_eq!(sync.total_unread(), 3);
        assert_eq!(sync.conversations()[1].peer_id, 7);

        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert_eq!(transport.count("conversations_list.php"), 3);

        sync.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.count("conversations_list.php"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_notifications_are_throttled() {
        let (transport, sync) = setup().await;
        transport.ok("messages_history.php", json!({ "items": [] }));
        transport.ok("typing_set.php", json!({}));
        assert!(!sync.notify_typing());

        sync.open_conversation(42).await.unwrap();
        assert!(sync.notify_typing());
        assert!(!sync.notify_typing());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!sync.notify_typing());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(sync.notify_typing());

        settle().await;
        assert_eq!(transport.count("typing_set.php"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_conversation_removes_and_closes() {
        let (transport, sync) = setup().await;
        transport.ok(
            "conversations_list.php",
            json!({ "items": [{ "id": 1, "a_id": 1, "b_id": 42 }] }),
        );
        transport.ok("messages_history.php", json!({ "items": [msg(5, 42)] }));
        sync.refresh_conversation_list().await.unwrap();
        sync.open_conversation(42).await.unwrap();

        transport.fail("messages_delete_conversation.php", 500, "xato");
        assert!(sync.delete_conversation().await.is_err());
        assert_eq!(sync.active_peer(), Some(42));
        assert_eq!(sync.conversations().len(), 1);

        transport.ok("messages_delete_conversation.php", json!({}));
        transport.ok("conversations_list.php", json!({ "items": [] }));
        sync.delete_conversation().await.unwrap();
        assert_eq!(sync.active_peer(), None);
        assert!(sync.conversations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn search_scopes_to_open_peer_and_skips_empty_query() {
        let (transport, sync) = setup().await;
        transport.ok("messages_search.php", json!({ "items": [msg(3, 42)] }));
        transport.ok("messages_history.php", json!({ "items": [] }));

        assert!(sync.search_messages("  ").await.unwrap().is_empty());
        assert_eq!(transport.count("messages_search.php"), 0);

        sync.search_messages("salom").await.unwrap();
        assert_eq!(query_param(&transport.calls_to("messages_search.php")[0], "peer_id"), None);

        sync.open_conversation(42).await.unwrap();
        let found = sync.search_messages("salom").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            query_param(&transport.calls_to("messages_search.php")[1], "peer_id").as_deref(),
            Some("42")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_same_peer_is_noop_and_switching_resets() {
        let (transport, sync) = setup().await;
        transport.on("messages_history.php", |req| {
            let peer = query_param(req, "peer_id").unwrap_or_default();
            match (peer.as_str(), query_param(req, "since_id")) {
                ("42", None) => Ok(json!({ "items": [msg(5, 42)] })),
                ("43", None) => Ok(json!({ "items": [] })),
                _ => Ok(json!({ "items": [] })),
            }
        });

        sync.open_conversation(42).await.unwrap();
        sync.open_conversation(42).await.unwrap();
        assert_eq!(transport.count("messages_history.php"), 1);

        sync.open_conversation(43).await.unwrap();
        assert_eq!(sync.active_peer(), Some(43));
        assert_eq!(sync.cursor(), 0);
        assert!(sync.messages().is_empty());

        assert!(matches!(
            sync.open_conversation(0).await,
            Err(SdkError::Validation(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn switching_peer_resets_typing_throttle() {
        let (transport, sync) = setup().await;
        transport.ok("messages_history.php", json!({ "items": [] }));
        transport.ok("typing_set.php", json!({}));

        sync.open_conversation(42).await.unwrap();
        assert!(sync.notify_typing());
        sync.open_conversation(43).await.unwrap();
        assert!(sync.notify_typing());
        sync.close_conversation();
        sync.open_conversation(42).await.unwrap();
        assert!(sync.notify_typing());

        settle().await;
        let peers: Vec<RequestBody> = transport
            .calls_to("typing_set.php")
            .into_iter()
            .map(|c| c.body)
            .collect();
        assert_eq!(
            peers,
            vec![
                RequestBody::Json(json!({ "peer_id": 42 })),
                RequestBody::Json(json!({ "peer_id": 43 })),
                RequestBody::Json(json!({ "peer_id": 42 })),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_session_drops_state_and_stops_polling() {
        let (transport, sync) = setup().await;
        transport.ok(
            "conversations_list.php",
            json!({ "items": [{ "id": 1, "a_id": 1, "b_id": 42, "unread": 2 }] }),
        );
        transport.ok("messages_history.php", json!({ "items": [msg(5, 42)] }));

        sync.start();
        sync.open_conversation(42).await.unwrap();
        settle().await;
        assert_eq!(sync.total_unread(), 2);

        // 不经过 stop()，直接清除登录状态（例如修改密码后）
        sync.inner.session.logout().await;
        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(sync.active_peer(), None);
        assert!(sync.messages().is_empty());
        assert!(sync.conversations().is_empty());
        assert_eq!(sync.total_unread(), 0);

        transport.reset_calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.count("messages_history.php"), 0);
        assert_eq!(transport.count("typing_status.php"), 0);
        assert_eq!(transport.count("conversations_list.php"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn list_result_for_previous_token_is_discarded() {
        let (transport, sync) = setup().await;
        transport.ok(
            "conversations_list.php",
            json!({ "items": [{ "id": 1, "a_id": 1, "b_id": 42 }] }),
        );
        let stale = sync.inner.token().unwrap();

        // 旧 token 的请求还在路上时换了账号
        transport.ok(
            "login.php",
            json!({ "token": "bob-token", "user": { "id": 2, "username": "bob" } }),
        );
        transport.ok("me.php", json!({ "id": 2, "username": "bob" }));
        sync.inner.session.login("bob", "bobpass123").await.unwrap();
        assert_eq!(sync.inner.token().unwrap(), "bob-token");

        let err = sync.inner.refresh_conversation_list(stale).await.unwrap_err();
        assert!(matches!(err, SdkError::Auth(_)));
        assert!(sync.conversations().is_empty());
    }
}
