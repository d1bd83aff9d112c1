//! 私信模块
//!
//! 会话列表与当前会话的轮询同步

pub mod api;
pub mod listener;
pub mod models;
pub mod service;
pub mod types;

// 重新导出主要类型
pub use api::ConversationApi;
pub use listener::{ConversationListener, EmptyConversationListener};
pub use models::ConversationSyncerConfig;
pub use service::ConversationSynchronizer;
pub use types::{ConversationSummary, Message, PollOutcome};
