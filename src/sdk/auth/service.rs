//! 会话管理服务层
//!
//! 持有 bearer token 和当前用户快照，所有创建 / 销毁会话的操作都经过这里。
//!
//! 状态机：
//! - `Unauthenticated` → (`login` / `adopt_session` / `restore` 设置 token) → `Resolving`
//! - `Resolving` → (`refresh_current_user` 成功) → `Authenticated`
//! - 任意状态 → (`logout` 或 `refresh_current_user` 被拒绝) → `Unauthenticated`
//!
//! token 存在期间后台定时发送心跳。

use crate::sdk::auth::api::AuthApi;
use crate::sdk::auth::listener::{EmptySessionListener, SessionListener};
use crate::sdk::auth::types::{ProviderPayload, SessionSnapshot, SessionStatus, UserFetch};
use crate::sdk::error::{Result, SdkError};
use crate::sdk::lock;
use crate::sdk::scheduler::ScheduledTask;
use crate::sdk::storage::TokenStore;
use crate::sdk::types::User;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct SessionManager {
    api: AuthApi,
    store: Arc<dyn TokenStore>,
    listener: Arc<dyn SessionListener>,
    heartbeat_interval: Duration,
    state: Mutex<SessionSnapshot>,
    heartbeat: Mutex<Option<ScheduledTask>>,
}

impl SessionManager {
    /// 创建会话管理器（使用默认空监听器）
    pub fn new(api: AuthApi, store: Arc<dyn TokenStore>, heartbeat_interval: Duration) -> Self {
        Self::with_listener(api, store, heartbeat_interval, Arc::new(EmptySessionListener))
    }

    /// 创建会话管理器（带自定义监听器）
    pub fn with_listener(
        api: AuthApi,
        store: Arc<dyn TokenStore>,
        heartbeat_interval: Duration,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        Self {
            api,
            store,
            listener,
            heartbeat_interval,
            state: Mutex::new(SessionSnapshot::default()),
            heartbeat: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.state).clone()
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.state).token.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        lock(&self.state).user.clone()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.state).status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// 当前用户 ID，未登录时为 0
    pub fn current_user_id(&self) -> i64 {
        lock(&self.state).user.as_ref().map(|u| u.id).unwrap_or(0)
    }

    /// 应用启动：读取已保存的 token 并校验
    pub async fn restore(&self) -> UserFetch {
        let token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("[Session] 没有已保存的 token");
                return UserFetch::NoSession;
            }
            Err(e) => {
                warn!("[Session] 读取已保存的 token 失败: {}", e);
                return UserFetch::NoSession;
            }
        };

        info!("[Session] 🔄 恢复已保存的会话，正在校验 token");
        self.install_session(token, None).await;
        self.refresh_current_user().await
    }

    /// 用户名 / 密码登录
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<User> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(SdkError::validation("请输入用户名和密码"));
        }
        self.adopt_session(ProviderPayload::Password {
            identifier: identifier.to_string(),
            secret: secret.to_string(),
        })
        .await
    }

    /// 所有登录方式的统一入口：交换 token + user，成功后校验当前用户
    ///
    /// 交换失败时原有会话保持不变。
    pub async fn adopt_session(&self, payload: ProviderPayload) -> Result<User> {
        let provider = payload.provider();
        let (token, user) = match self.api.exchange(&payload).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("[Session] ❌ {:?} 登录失败: {}", provider, e);
                return Err(e);
            }
        };

        info!(
            "[Session] ✅ {:?} 登录成功，用户: {} (ID: {})",
            provider, user.username, user.id
        );
        self.install_session(token, Some(user)).await;

        match self.refresh_current_user().await {
            UserFetch::Resolved(user) => Ok(user),
            UserFetch::Rejected(e) => Err(SdkError::auth(e.user_message())),
            UserFetch::NoSession => Err(SdkError::auth("会话已失效，请重新登录")),
        }
    }

    /// 登出：尽力通知服务器（失败忽略），本地无条件清除
    pub async fn logout(&self) {
        if let Some(token) = self.token() {
            if let Err(e) = self.api.logout(&token).await {
                debug!("[Session] 服务器登出失败（忽略）: {}", e);
            }
        }
        info!("[Session] 👋 已登出");
        self.clear_session();
        self.listener.on_session_changed(self.snapshot()).await;
    }

    /// 获取当前用户，不修改任何状态
    pub async fn fetch_current_user(&self) -> UserFetch {
        let Some(token) = self.token() else {
            return UserFetch::NoSession;
        };
        match self.api.me(&token).await {
            Ok(user) => UserFetch::Resolved(user),
            Err(e) => UserFetch::Rejected(e),
        }
    }

    /// 刷新当前用户；被拒绝时视为 token 失效并登出
    ///
    /// 这是发现并清除无效 token 的唯一路径。
    pub async fn refresh_current_user(&self) -> UserFetch {
        let Some(token) = self.token() else {
            return UserFetch::NoSession;
        };

        let result = self.fetch_current_user().await;
        match &result {
            UserFetch::Resolved(user) => {
                let applied = {
                    let mut state = lock(&self.state);
                    if state.token.as_deref() == Some(token.as_str()) {
                        state.user = Some(user.clone());
                        state.status = SessionStatus::Authenticated;
                        true
                    } else {
                        false
                    }
                };
                if applied {
                    debug!("[Session] 当前用户已解析: {}", user.username);
                    self.listener.on_session_changed(self.snapshot()).await;
                }
            }
            UserFetch::Rejected(e) => {
                let still_current = lock(&self.state).token.as_deref() == Some(token.as_str());
                if still_current {
                    warn!("[Session] ⚠️ token 被服务器拒绝，清除会话: {}", e);
                    self.clear_session();
                    self.listener.on_session_changed(self.snapshot()).await;
                    self.listener.on_session_expired(e.user_message()).await;
                }
            }
            UserFetch::NoSession => {}
        }
        result
    }

    /// 确保心跳任务在运行；没有 token 时返回 false
    pub fn keep_alive(&self) -> bool {
        match self.token() {
            Some(token) => {
                let running = lock(&self.heartbeat)
                    .as_ref()
                    .map(|t| !t.is_finished())
                    .unwrap_or(false);
                if !running {
                    self.start_heartbeat(token);
                }
                true
            }
            None => false,
        }
    }

    /// 发送一次心跳，失败忽略
    pub async fn send_heartbeat(&self) {
        if let Some(token) = self.token() {
            if let Err(e) = self.api.ping(&token).await {
                debug!("[Session] 心跳失败（忽略）: {}", e);
            }
        }
    }

    /// 本地更新当前用户（资料修改后）
    pub fn set_current_user(&self, user: User) {
        let mut state = lock(&self.state);
        if state.token.is_some() {
            state.user = Some(user);
        }
    }

    pub fn update_current_user<F: FnOnce(&mut User)>(&self, f: F) {
        if let Some(user) = lock(&self.state).user.as_mut() {
            f(user);
        }
    }

    /// 整体替换 token / user，持久化 token，重启心跳
    async fn install_session(&self, token: String, user: Option<User>) {
        {
            let mut state = lock(&self.state);
            state.token = Some(token.clone());
            state.user = user;
            state.status = SessionStatus::Resolving;
        }
        if let Err(e) = self.store.save(&token) {
            warn!("[Session] 保存 token 失败: {}", e);
        }
        self.start_heartbeat(token);
        self.listener.on_session_changed(self.snapshot()).await;
    }

    /// token 与 user 一起清除
    fn clear_session(&self) {
        {
            let mut state = lock(&self.state);
            *state = SessionSnapshot::default();
        }
        if let Some(task) = lock(&self.heartbeat).take() {
            task.cancel();
        }
        if let Err(e) = self.store.clear() {
            warn!("[Session] 清除已保存的 token 失败: {}", e);
        }
    }

    fn start_heartbeat(&self, token: String) {
        let api = self.api.clone();
        let task = ScheduledTask::every("session-heartbeat", self.heartbeat_interval, move || {
            let api = api.clone();
            let token = token.clone();
            async move {
                if let Err(e) = api.ping(&token).await {
                    debug!("[Session] 心跳失败（忽略）: {}", e);
                }
            }
        });
        // 旧任务在 drop 时终止
        *lock(&self.heartbeat) = Some(task);
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.heartbeat).take() {
            task.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::auth::types::TelegramAuth;
    use crate::sdk::storage::MemoryTokenStore;
    use crate::sdk::testing::{init_test_logger, MockTransport};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        changes: AtomicUsize,
        expired: AtomicUsize,
    }

    #[async_trait]
    impl SessionListener for CountingListener {
        async fn on_session_changed(&self, _snapshot: SessionSnapshot) {
            self.changes.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_session_expired(&self, _reason: String) {
            self.expired.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn alice() -> serde_json::Value {
        json!({ "id": 1, "username": "alice" })
    }

    fn setup() -> (
        Arc<MockTransport>,
        Arc<MemoryTokenStore>,
        Arc<CountingListener>,
        SessionManager,
    ) {
        init_test_logger();
        let transport = MockTransport::new();
        let store = Arc::new(MemoryTokenStore::new());
        let listener = Arc::new(CountingListener::default());
        let manager = SessionManager::with_listener(
            AuthApi::new(transport.clone()),
            store.clone(),
            Duration::from_secs(30),
            listener.clone(),
        );
        (transport, store, listener, manager)
    }

    #[tokio::test]
    async fn login_with_password_authenticates_alice() {
        let (transport, store, _listener, manager) = setup();
        transport.ok("login.php", json!({ "token": "abc", "user": alice() }));
        transport.ok("me.php", alice());

        let user = manager.login("alice", "secret123").await.unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(manager.status(), SessionStatus::Authenticated);
        assert_eq!(manager.current_user().unwrap().username, "alice");
        assert_eq!(manager.token().as_deref(), Some("abc"));
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));

        let login_call = &transport.calls_to("login.php")[0];
        assert_eq!(
            login_call.body,
            crate::sdk::transport::RequestBody::Json(json!({
                "username": "alice",
                "password": "secret123",
            }))
        );
        assert_eq!(transport.calls_to("me.php")[0].token.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn logout_clears_session_even_when_server_fails() {
        let (transport, store, _listener, manager) = setup();
        transport.ok("login.php", json!({ "token": "abc", "user": alice() }));
        transport.ok("me.php", alice());
        transport.fail("logout.php", 500, "boom");

        manager.login("alice", "secret123").await.unwrap();
        manager.logout().await;

        assert_eq!(manager.token(), None);
        assert_eq!(manager.current_user(), None);
        assert_eq!(manager.status(), SessionStatus::Unauthenticated);
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(transport.count("logout.php"), 1);

        // 服务器登出成功时结果相同
        transport.ok("logout.php", json!({}));
        manager.login("alice", "secret123").await.unwrap();
        manager.logout().await;
        assert_eq!(manager.token(), None);
        assert_eq!(manager.current_user(), None);
    }

    #[tokio::test]
    async fn rejected_token_logs_out_exactly_once() {
        let (transport, _store, listener, manager) = setup();
        transport.ok("login.php", json!({ "token": "abc", "user": alice() }));
        transport.ok("me.php", alice());
        manager.login("alice", "secret123").await.unwrap();
        assert!(manager.is_authenticated());

        transport.fail("me.php", 401, "Token yaroqsiz");
        let first = manager.refresh_current_user().await;
        let second = manager.refresh_current_user().await;

        assert_eq!(first, UserFetch::Rejected(SdkError::api(401, "Token yaroqsiz")));
        assert_eq!(second, UserFetch::NoSession);
        assert_eq!(listener.expired.load(Ordering::SeqCst), 1);
        assert_eq!(manager.status(), SessionStatus::Unauthenticated);
        assert_eq!(manager.current_user(), None);
    }

    #[tokio::test]
    async fn adopt_session_without_token_keeps_existing_session() {
        let (transport, _store, _listener, manager) = setup();
        transport.ok("login.php", json!({ "token": "abc", "user": alice() }));
        transport.ok("me.php", alice());
        manager.login("alice", "secret123").await.unwrap();
        let before = manager.snapshot();

        transport.ok("oauth_telegram.php", json!({ "user": { "id": 2, "username": "bob" } }));
        let err = manager
            .adopt_session(ProviderPayload::Telegram(TelegramAuth {
                id: 99,
                first_name: Some("Bob".into()),
                last_name: None,
                username: Some("bob".into()),
                photo_url: None,
                auth_date: 1_700_000_000,
                hash: "deadbeef".into(),
            }))
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Auth(_)));
        assert_eq!(manager.snapshot(), before);
    }

    #[tokio::test]
    async fn failed_login_surfaces_server_message_and_keeps_prior_state() {
        let (transport, _store, _listener, manager) = setup();
        transport.fail("login.php", 423, "Hisob bloklangan");

        let err = manager.login("alice", "wrong").await.unwrap_err();

        assert_eq!(err, SdkError::auth("Hisob bloklangan"));
        assert_eq!(manager.snapshot(), SessionSnapshot::default());
        assert_eq!(transport.count("me.php"), 0);
    }

    #[tokio::test]
    async fn empty_credentials_never_reach_the_server() {
        let (transport, _store, _listener, manager) = setup();
        let err = manager.login("   ", "secret").await.unwrap_err();
        assert!(matches!(err, SdkError::Validation(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn github_and_google_use_their_exchange_endpoints() {
        let (transport, _store, _listener, manager) = setup();
        transport.ok("oauth_github.php", json!({ "token": "gh", "user": alice() }));
        transport.ok("oauth_google.php", json!({ "token": "gg", "user": alice() }));
        transport.ok("me.php", alice());

        manager
            .adopt_session(ProviderPayload::Github { code: "c0de".into() })
            .await
            .unwrap();
        assert_eq!(manager.token().as_deref(), Some("gh"));

        manager
            .adopt_session(ProviderPayload::Google { id_token: "jwt".into() })
            .await
            .unwrap();
        assert_eq!(manager.token().as_deref(), Some("gg"));
        assert_eq!(
            transport.calls_to("oauth_google.php")[0].body,
            crate::sdk::transport::RequestBody::Json(json!({ "id_token": "jwt" }))
        );
    }

    #[tokio::test]
    async fn restore_purges_invalid_persisted_token() {
        init_test_logger();
        let transport = MockTransport::new();
        let store = Arc::new(MemoryTokenStore::with_token("stale"));
        transport.fail("me.php", 401, "expired");
        let manager = SessionManager::new(
            AuthApi::new(transport.clone()),
            store.clone(),
            Duration::from_secs(30),
        );

        let result = manager.restore().await;

        assert!(matches!(result, UserFetch::Rejected(_)));
        assert_eq!(manager.token(), None);
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn restore_resolves_valid_persisted_token() {
        init_test_logger();
        let transport = MockTransport::new();
        transport.ok("me.php", alice());
        let manager = SessionManager::new(
            AuthApi::new(transport.clone()),
            Arc::new(MemoryTokenStore::with_token("abc")),
            Duration::from_secs(30),
        );

        assert!(matches!(manager.restore().await, UserFetch::Resolved(_)));
        assert!(manager.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_runs_while_token_present_and_stops_after_logout() {
        let (transport, _store, _listener, manager) = setup();
        transport.ok("login.php", json!({ "token": "abc", "user": alice() }));
        transport.ok("me.php", alice());
        transport.fail("ping.php", 500, "ignored");
        transport.ok("logout.php", json!({}));

        manager.login("alice", "secret123").await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(transport.count("ping.php"), 2);
        // 心跳失败不影响本地状态
        assert!(manager.is_authenticated());

        manager.logout().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.count("ping.php"), 2);
        assert!(!manager.keep_alive());
    }

    #[tokio::test]
    async fn update_current_user_patches_snapshot() {
        let (transport, _store, _listener, manager) = setup();
        transport.ok("login.php", json!({ "token": "abc", "user": alice() }));
        transport.ok("me.php", alice());
        manager.login("alice", "secret123").await.unwrap();

        manager.update_current_user(|u| u.username = "alice2".into());
        assert_eq!(manager.current_user().unwrap().username, "alice2");
    }
}
