//! CyberX CLI 客户端（测试版）
//!
//! 非交互式 CLI：登录（或恢复已保存的会话），展示会话列表，
//! 可选地打开一个会话并发送一条消息，然后持续打印收到的事件。

use anyhow::{Context, Result};
use clap::Parser;
use cyberx_sdk_core::sdk::auth::SessionListener;
use cyberx_sdk_core::sdk::conversation::ConversationListener;
use cyberx_sdk_core::{
    ClientConfig, ConversationSummary, CyberxClient, Message, SessionSnapshot, UserFetch,
};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

/// CyberX CLI 客户端
#[derive(Parser, Debug)]
#[command(name = "cyberx-cli")]
#[command(about = "CyberX CLI 客户端 - 用于测试会话和私信功能", long_about = None)]
struct Args {
    /// API 基础地址
    #[arg(long, env = "CYBERX_API_BASE")]
    api_base: Option<String>,

    /// 用户名或邮箱（不提供时尝试恢复已保存的会话）
    #[arg(short, long)]
    username: Option<String>,

    /// 密码
    #[arg(short, long, env = "CYBERX_PASSWORD")]
    password: Option<String>,

    /// token 保存文件
    #[arg(long, env = "CYBERX_TOKEN_FILE", default_value = ".cyberx_token")]
    token_file: PathBuf,

    /// 打开与该用户的会话
    #[arg(long)]
    peer: Option<i64>,

    /// 打开会话后发送的消息
    #[arg(short, long, requires = "peer")]
    message: Option<String>,

    /// 运行时长（秒），0 表示持续运行
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// 日志级别（默认: info,cyberx_sdk_core=debug）
    #[arg(long, default_value = "info,cyberx_sdk_core=debug")]
    log_level: String,

    /// 日志文件（追加写入）
    #[arg(long, default_value = "debug.log")]
    log_file: PathBuf,
}

/// 控制台带颜色输出，`log_file` 追加写入纯文本；`RUST_LOG` 优先于 `--log-level`
fn init_logger(log_level: &str, log_file: &Path) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .with_context(|| format!("无效的日志级别: {}", log_level))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("无法打开日志文件 {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_line_number(true))
        .with(
            fmt::layer()
                .with_target(false)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("日志系统重复初始化")?;

    info!("[CLI] 📝 日志写入控制台和 {}", log_file.display());
    Ok(())
}

struct CliSessionListener;

#[async_trait::async_trait]
impl SessionListener for CliSessionListener {
    async fn on_session_changed(&self, snapshot: SessionSnapshot) {
        info!(
            "[CLI/Session] 🔄 会话状态: {:?}，用户: {}",
            snapshot.status,
            snapshot
                .user
                .as_ref()
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| "-".into())
        );
    }

    async fn on_session_expired(&self, reason: String) {
        error!("[CLI/Session] ⚠️ 会话已失效: {}", reason);
    }
}

struct CliConversationListener;

#[async_trait::async_trait]
impl ConversationListener for CliConversationListener {
    async fn on_conversation_list_changed(&self, conversations: Vec<ConversationSummary>) {
        let unread: i64 = conversations.iter().map(|c| c.unread).sum();
        info!(
            "[CLI/Conversation] 📋 会话列表: {} 个，未读 {}",
            conversations.len(),
            unread
        );
    }

    async fn on_new_messages(&self, peer_id: i64, messages: Vec<Message>) {
        for m in messages {
            info!(
                "[CLI/Message] 📨 [{}] {} → {}: {}",
                peer_id, m.sender_id, m.receiver_id, m.body
            );
        }
    }

    async fn on_peer_typing_changed(&self, peer_id: i64, typing: bool) {
        if typing {
            info!("[CLI/Message] ⌨️ 用户 {} 正在输入...", peer_id);
        }
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(30).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(&args.log_level, &args.log_file)?;

    info!("[CLI] 🚀 CyberX CLI 客户端（测试模式）");
    info!("[CLI] ⏱️  运行时长: {} 秒（0=持续运行）", args.duration);

    let mut config = match &args.api_base {
        Some(base) => ClientConfig::new(base.clone()),
        None => ClientConfig::from_env(),
    };
    config = config.with_token_file(&args.token_file);

    let client = CyberxClient::with_listeners(
        config,
        Arc::new(CliSessionListener),
        Arc::new(CliConversationListener),
    )
    .context("创建客户端失败")?;

    let user = match (&args.username, &args.password) {
        (Some(username), Some(password)) => {
            info!("[CLI] 🔐 正在登录: {}", username);
            client
                .login(username, password)
                .await
                .map_err(|e| anyhow::anyhow!("登录失败: {}", e.user_message()))?
        }
        _ => {
            info!("[CLI] 🔄 未提供用户名和密码，尝试恢复已保存的会话");
            match client.restore().await {
                UserFetch::Resolved(user) => user,
                UserFetch::Rejected(e) => {
                    anyhow::bail!("已保存的会话无效: {}", e.user_message())
                }
                UserFetch::NoSession => {
                    anyhow::bail!("没有已保存的会话，请使用 --username 和 --password 登录")
                }
            }
        }
    };
    info!("[CLI] ✅ 已登录: {} (ID: {})", user.display_name(), user.id);

    match client.conversations().refresh_conversation_list().await {
        Ok(conversations) => {
            info!("[CLI] 📋 会话列表（共 {} 个）:", conversations.len());
            for conv in conversations.iter().take(5) {
                info!(
                    "[CLI]   - {} | 未读: {} | 最新: {}",
                    conv.title,
                    conv.unread,
                    preview(&conv.last_message)
                );
            }
        }
        Err(e) => warn!("[CLI] 获取会话列表失败: {}", e),
    }

    if let Some(peer) = args.peer {
        if let Err(e) = client.conversations().open_conversation(peer).await {
            warn!("[CLI] 加载历史消息失败，继续轮询: {}", e);
        }
        info!(
            "[CLI] 💬 已打开与用户 {} 的会话（{} 条消息）",
            peer,
            client.conversations().messages().len()
        );
        if let Some(text) = &args.message {
            let sent = client
                .conversations()
                .send_message(text)
                .await
                .map_err(|e| anyhow::anyhow!("发送失败: {}", e.user_message()))?;
            info!("[CLI] 📤 消息已发送 (ID: {})", sent.id);
        }
    }

    info!("[CLI] 📥 开始监听消息...");
    if args.duration > 0 {
        info!("[CLI] ⏰ {} 秒后自动退出", args.duration);
        sleep(Duration::from_secs(args.duration)).await;
    } else {
        info!("[CLI] ⏰ 持续运行中，按 Ctrl+C 退出");
        tokio::signal::ctrl_c().await.context("等待 Ctrl+C 失败")?;
    }

    // 保留 token 以便下次恢复，只停止轮询
    client.conversations().stop();
    info!("[CLI] 👋 程序退出");
    Ok(())
}
