//! 社交服务层
//!
//! 用户目录、关注关系和帖子；所有操作都使用当前会话的 token。

use crate::sdk::auth::SessionManager;
use crate::sdk::error::{Result, SdkError};
use crate::sdk::social::api::SocialApi;
use crate::sdk::social::types::{LikeAction, NewPost, Post, Profile, UserCard};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// 分页累加器：页码从 1 开始，返回空页后视为到底
#[derive(Debug, Clone)]
pub struct Paginator<T> {
    items: Vec<T>,
    next_page: u32,
    per_page: u32,
    done: bool,
}

impl<T> Paginator<T> {
    pub fn new(per_page: u32) -> Self {
        Self {
            items: Vec::new(),
            next_page: 1,
            per_page,
            done: false,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// 回到第一页并清空已加载内容
    pub fn reset(&mut self) {
        self.items.clear();
        self.next_page = 1;
        self.done = false;
    }

    /// 加载下一页并追加，返回本页条数；已到底时不发请求
    pub async fn load_next<F, Fut>(&mut self, fetch: F) -> Result<usize>
    where
        F: FnOnce(u32, u32) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        if self.done {
            return Ok(0);
        }
        let page = fetch(self.next_page, self.per_page).await?;
        let loaded = page.len();
        if loaded == 0 {
            self.done = true;
        } else {
            self.items.extend(page);
            self.next_page += 1;
        }
        Ok(loaded)
    }
}

pub struct SocialService {
    api: SocialApi,
    session: Arc<SessionManager>,
    page_size: u32,
}

impl SocialService {
    /// `page_size` 为列表默认每页条数（见 `ClientConfig::page_size`）
    pub fn new(api: SocialApi, session: Arc<SessionManager>, page_size: u32) -> Self {
        Self {
            api,
            session,
            page_size,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// 按默认每页条数创建分页器
    pub fn paginator<T>(&self) -> Paginator<T> {
        Paginator::new(self.page_size)
    }

    fn token(&self) -> Result<String> {
        self.session.token().ok_or_else(|| SdkError::auth("未登录"))
    }

    pub async fn list_users(
        &self,
        page: u32,
        per: u32,
        query: Option<&str>,
    ) -> Result<Vec<UserCard>> {
        self.api.list_users(&self.token()?, page, per, query).await
    }

    pub async fn users_count(&self) -> Result<i64> {
        self.api.users_count(&self.token()?).await
    }

    pub async fn user_profile(&self, profile_token: &str) -> Result<Profile> {
        self.api.user_profile(&self.token()?, profile_token).await
    }

    /// 关注 / 取关；自己的主页直接返回
    pub async fn toggle_follow(&self, profile: &mut Profile) -> Result<()> {
        if profile.id == self.session.current_user_id() {
            debug!("[Social] 忽略对自己的关注操作");
            return Ok(());
        }
        self.api.follow_toggle(&self.token()?, profile.id).await?;
        profile.already_following = !profile.already_following;
        profile.followers = if profile.already_following {
            profile.followers + 1
        } else {
            (profile.followers - 1).max(0)
        };
        info!(
            "[Social] {} 用户 {}",
            if profile.already_following { "已关注" } else { "已取关" },
            profile.id
        );
        Ok(())
    }

    /// 在目录列表中切换某个用户的关注状态，返回新状态
    pub async fn toggle_follow_card(
        &self,
        cards: &mut [UserCard],
        user_id: i64,
    ) -> Result<bool> {
        if user_id == self.session.current_user_id() {
            return Err(SdkError::validation("不能关注自己"));
        }
        let card = cards
            .iter_mut()
            .find(|c| c.id == user_id)
            .ok_or_else(|| SdkError::validation(format!("列表中没有用户 {}", user_id)))?;
        self.api.follow_toggle(&self.token()?, user_id).await?;
        card.following = !card.following;
        Ok(card.following)
    }

    pub async fn followers(&self, user_id: i64, page: u32, per: u32) -> Result<Vec<UserCard>> {
        self.api.followers(&self.token()?, user_id, page, per).await
    }

    pub async fn following(&self, user_id: i64, page: u32, per: u32) -> Result<Vec<UserCard>> {
        self.api.following(&self.token()?, user_id, page, per).await
    }

    /// 发帖：正文或图片至少有一项
    pub async fn create_post(&self, post: NewPost) -> Result<()> {
        if post.body.trim().is_empty() && post.images.is_empty() {
            return Err(SdkError::validation("请填写内容或添加图片"));
        }
        let token = self.token()?;
        let images = post.images.len();
        self.api.create_post(&token, post).await?;
        info!("[Social] 帖子已发布 ({} 张图片)", images);
        Ok(())
    }

    pub async fn user_posts(
        &self,
        profile_token: &str,
        page: u32,
        per: u32,
    ) -> Result<Vec<Post>> {
        let resp = self.api.user_posts(&self.token()?, profile_token, page, per).await?;
        Ok(resp.posts)
    }

    /// 点赞 / 取消点赞，按服务器返回的动作更新本地计数
    pub async fn toggle_like(&self, posts: &mut [Post], post_id: i64) -> Result<LikeAction> {
        let token = self.token()?;
        let action = self.api.react(&token, post_id).await?;
        if let Some(post) = posts.iter_mut().find(|p| p.id == post_id) {
            match action {
                LikeAction::Added => {
                    post.liked_by_me = true;
                    post.likes_count += 1;
                }
                LikeAction::Removed => {
                    post.liked_by_me = false;
                    post.likes_count = (post.likes_count - 1).max(0);
                }
            }
        }
        Ok(action)
    }

    pub async fn likes(&self, post_id: i64) -> Result<Vec<UserCard>> {
        self.api.likes(&self.token()?, post_id).await
    }
}
