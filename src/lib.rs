pub mod sdk;

// 重新导出常用类型，方便外部使用
pub use sdk::{
    account::{AccountService, Availability},
    auth::{ProviderPayload, SessionListener, SessionManager, SessionSnapshot, UserFetch},
    conversation::{ConversationListener, ConversationSummary, ConversationSynchronizer, Message},
    social::{Paginator, SocialService},
    ClientConfig, CyberxClient, Result, SdkError, User,
};
