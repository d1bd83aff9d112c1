//! 客户端配置

use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// 默认 API 地址
pub const DEFAULT_API_BASE: &str = "https://cyberex.uz/backend/public/api";

/// 客户端配置
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// HTTP API 基础地址
    pub api_base_url: String,
    /// token 持久化文件；为 None 时只保存在内存中
    pub token_file: Option<PathBuf>,
    /// 单个请求超时；为 None 时不设置（挂起的请求只会推迟该循环的下一次 tick）
    pub request_timeout: Option<Duration>,
    /// 会话心跳间隔
    pub heartbeat_interval: Duration,
    /// 会话列表轮询间隔
    pub conversation_list_interval: Duration,
    /// 当前聊天（新消息 + 输入状态）轮询间隔
    pub active_conversation_interval: Duration,
    /// “正在输入”通知的最小间隔
    pub typing_throttle: Duration,
    /// 打开会话时拉取的历史消息条数
    pub history_limit: u32,
    /// 列表分页大小
    pub page_size: u32,
}

impl ClientConfig {
    /// 创建默认配置
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token_file: None,
            request_timeout: None,
            heartbeat_interval: Duration::from_secs(30),
            conversation_list_interval: Duration::from_secs(2),
            active_conversation_interval: Duration::from_secs(1),
            typing_throttle: Duration::from_millis(600),
            history_limit: 200,
            page_size: 24,
        }
    }

    /// 从环境变量读取：`CYBERX_API_BASE`、`CYBERX_TOKEN_FILE`
    pub fn from_env() -> Self {
        let base = std::env::var("CYBERX_API_BASE").unwrap_or_else(|_| {
            info!("[Config] CYBERX_API_BASE 未设置，使用默认地址: {}", DEFAULT_API_BASE);
            DEFAULT_API_BASE.to_string()
        });
        let mut config = Self::new(base);
        if let Ok(path) = std::env::var("CYBERX_TOKEN_FILE") {
            if !path.trim().is_empty() {
                config.token_file = Some(PathBuf::from(path));
            }
        }
        config
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}
