//! 会话本地模型定义

use crate::sdk::config::ClientConfig;
use crate::sdk::conversation::types::Message;
use std::time::Duration;

/// 会话同步器配置
#[derive(Debug, Clone)]
pub struct ConversationSyncerConfig {
    /// 会话列表轮询间隔
    pub list_interval: Duration,
    /// 当前会话轮询间隔
    pub active_interval: Duration,
    /// “正在输入”通知最小间隔
    pub typing_throttle: Duration,
    /// 打开会话时拉取的历史条数
    pub history_limit: u32,
}

impl From<&ClientConfig> for ConversationSyncerConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            list_interval: config.conversation_list_interval,
            active_interval: config.active_conversation_interval,
            typing_throttle: config.typing_throttle,
            history_limit: config.history_limit,
        }
    }
}

impl Default for ConversationSyncerConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// 当前打开的会话
#[derive(Debug, Clone)]
pub(crate) struct ActiveConversation {
    pub peer_id: i64,
    /// 每次打开 / 关闭递增；在途请求的结果只应用到同一代
    pub generation: u64,
    pub messages: Vec<Message>,
    /// 已获取的最大消息 ID（since_id）
    pub cursor: i64,
    pub peer_typing: bool,
}

impl ActiveConversation {
    pub fn new(peer_id: i64, generation: u64) -> Self {
        Self {
            peer_id,
            generation,
            messages: Vec::new(),
            cursor: 0,
            peer_typing: false,
        }
    }

    /// 追加未见过的消息并推进游标，返回实际追加的消息
    pub fn append(&mut self, incoming: Vec<Message>) -> Vec<Message> {
        let mut appended = Vec::new();
        for message in incoming {
            if self.messages.iter().any(|m| m.id == message.id) {
                continue;
            }
            self.cursor = self.cursor.max(message.id);
            self.messages.push(message.clone());
            appended.push(message);
        }
        appended
    }
}
