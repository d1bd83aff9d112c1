//! CyberX 客户端
//!
//! 把会话管理、私信同步、账户设置、找回密码和社交服务装配到同一个传输层上。
//! 登录成功（或恢复会话成功）后自动启动会话列表轮询，登出时停止。

use crate::sdk::account::{AccountApi, AccountService};
use crate::sdk::auth::{
    AuthApi, EmptySessionListener, ProviderPayload, RecoveryService, SessionListener,
    SessionManager, UserFetch,
};
use crate::sdk::config::ClientConfig;
use crate::sdk::conversation::{
    ConversationApi, ConversationListener, ConversationSyncerConfig, ConversationSynchronizer,
    EmptyConversationListener,
};
use crate::sdk::error::Result;
use crate::sdk::social::{SocialApi, SocialService};
use crate::sdk::storage::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::sdk::transport::{HttpTransport, Transport};
use crate::sdk::types::User;
use std::sync::Arc;
use tracing::info;

pub struct CyberxClient {
    config: ClientConfig,
    session: Arc<SessionManager>,
    conversations: ConversationSynchronizer,
    account: AccountService,
    recovery: RecoveryService,
    social: SocialService,
}

impl CyberxClient {
    /// 使用 HTTP 传输层和空监听器创建客户端
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_listeners(
            config,
            Arc::new(EmptySessionListener),
            Arc::new(EmptyConversationListener),
        )
    }

    /// 使用 HTTP 传输层和自定义监听器创建客户端
    pub fn with_listeners(
        config: ClientConfig,
        session_listener: Arc<dyn SessionListener>,
        conversation_listener: Arc<dyn ConversationListener>,
    ) -> Result<Self> {
        let transport = HttpTransport::new(&config.api_base_url, config.request_timeout)?;
        Ok(Self::with_transport(
            config,
            Arc::new(transport),
            session_listener,
            conversation_listener,
        ))
    }

    /// 在给定传输层上装配所有服务
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        session_listener: Arc<dyn SessionListener>,
        conversation_listener: Arc<dyn ConversationListener>,
    ) -> Self {
        let store: Arc<dyn TokenStore> = match &config.token_file {
            Some(path) => {
                info!("[Client] token 保存到文件: {}", path.display());
                Arc::new(FileTokenStore::new(path.clone()))
            }
            None => Arc::new(MemoryTokenStore::new()),
        };

        let auth_api = AuthApi::new(transport.clone());
        let session = Arc::new(SessionManager::with_listener(
            auth_api.clone(),
            store,
            config.heartbeat_interval,
            session_listener,
        ));
        let conversations = ConversationSynchronizer::with_listener(
            ConversationApi::new(transport.clone()),
            session.clone(),
            ConversationSyncerConfig::from(&config),
            conversation_listener,
        );
        let account = AccountService::new(AccountApi::new(transport.clone()), session.clone());
        let social = SocialService::new(
            SocialApi::new(transport),
            session.clone(),
            config.page_size,
        );

        Self {
            config,
            session,
            conversations,
            account,
            recovery: RecoveryService::new(auth_api),
            social,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn conversations(&self) -> &ConversationSynchronizer {
        &self.conversations
    }

    pub fn account(&self) -> &AccountService {
        &self.account
    }

    pub fn recovery(&self) -> &RecoveryService {
        &self.recovery
    }

    pub fn social(&self) -> &SocialService {
        &self.social
    }

    /// 从 token 存储恢复会话；成功时启动私信同步
    pub async fn restore(&self) -> UserFetch {
        let result = self.session.restore().await;
        if matches!(result, UserFetch::Resolved(_)) {
            self.conversations.start();
        }
        result
    }

    /// 用户名 / 邮箱 + 密码登录
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<User> {
        let user = self.session.login(identifier, secret).await?;
        self.conversations.start();
        Ok(user)
    }

    /// 第三方登录（Google / GitHub / Telegram）
    pub async fn login_with(&self, payload: ProviderPayload) -> Result<User> {
        let user = self.session.adopt_session(payload).await?;
        self.conversations.start();
        Ok(user)
    }

    /// 停止同步后登出
    pub async fn logout(&self) {
        self.conversations.stop();
        self.session.logout().await;
    }
}
