//! 社交模块（用户目录、关注、帖子）

pub mod api;
pub mod service;
pub mod types;

// 重新导出主要类型
pub use api::SocialApi;
pub use service::{Paginator, SocialService};
pub use types::{ImageUpload, LikeAction, NewPost, Post, Profile, UserCard};
