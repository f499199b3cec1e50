// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use teleportd_agent::{AgentAdapter, ProcessAgentAdapter};
use teleportd_chat::{trailing_arg, Command as ChatCommand, TelegramFrontend};
use teleportd_server::token::StoredTokenFile;
use teleportd_server::{AppState, AuthState, ConnectionTracker, SetupLinkRegistry};
use teleportd_teleport::{ReloadCoordinator, ReloadNotifier, SessionManager, TeleportController, TeleportNotifier};
use teloxide::prelude::*;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = teleportd_config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::ShowConfig => {
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Commands::Serve => serve(config).await,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn default_token_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/teleportd/token.yaml")
}

/// Loads the stored bearer token hash, generating and printing a fresh
/// token once if none exists yet (§4.10).
fn load_or_bootstrap_token(path: &std::path::Path) -> anyhow::Result<StoredTokenFile> {
    if path.is_file() {
        return StoredTokenFile::load(path);
    }
    let raw = StoredTokenFile::generate_and_save(path)
        .with_context(|| format!("generating bearer token at {}", path.display()))?;
    println!("Generated a new bearer token (shown once):\n{raw}");
    StoredTokenFile::load(path)
}

struct NoopTeleportNotifier;
#[async_trait]
impl TeleportNotifier for NoopTeleportNotifier {
    async fn notify_teleport(&self, _chat_identity: &str, _cwd: &str) {}
}

struct NoopReloadNotifier;
#[async_trait]
impl ReloadNotifier for NoopReloadNotifier {
    async fn notify_reload_pending(&self) {}
    async fn notify_reloading(&self) {}
}

async fn serve(config: teleportd_config::OrchestratorConfig) -> anyhow::Result<()> {
    if !teleportd_config::is_usable(&config) {
        warn!("no chat identity configured yet; the chat frontend will only accept /link <token>");
    }

    let token_path = config.http.token_file.clone().unwrap_or_else(default_token_path);
    let stored = load_or_bootstrap_token(&token_path)?;
    let auth = AuthState::with_defaults(stored.token_hash);

    let sessions = {
        let mut manager = SessionManager::new(config.http.snapshot_path.clone());
        manager.load_state();
        Arc::new(Mutex::new(manager))
    };
    let teleport = Arc::new(TeleportController::new());
    let reload = Arc::new(ReloadCoordinator::new());
    let connections = Arc::new(ConnectionTracker::new());
    let setup_links = Arc::new(SetupLinkRegistry::new());

    let adapter: Arc<dyn AgentAdapter> =
        Arc::new(ProcessAgentAdapter::new(config.agent.command.clone(), config.agent.args.clone()));

    let default_cwd = std::env::current_dir()
        .context("resolving default working directory")?
        .display()
        .to_string();

    let (teleport_notifier, reload_notifier, bot_task): (
        Arc<dyn TeleportNotifier>,
        Arc<dyn ReloadNotifier>,
        Option<tokio::task::JoinHandle<()>>,
    ) = match (&config.chat.bot_token, config.chat.authorized_chat_id) {
        (Some(token), Some(chat_id)) => {
            let bot = Bot::new(token);
            let frontend = Arc::new(TelegramFrontend::new(bot.clone(), chat_id));
            let engine = Arc::new(teleportd_chat::ChatEngine::new(
                sessions.clone(),
                teleport.clone(),
                reload.clone(),
                adapter.clone(),
                frontend.clone(),
                chat_id.to_string(),
                default_cwd.clone(),
                config.agent.command.clone(),
            ));
            let me = bot.get_me().await.context("fetching bot identity")?;
            let bot_username = me.username().to_string();
            let setup_links_dep = setup_links.clone();
            let allowed_chat_id = frontend.allowed_chat_id();

            let handler = dptree::entry()
                .branch(Update::filter_message().endpoint(on_message))
                .branch(Update::filter_callback_query().endpoint(on_callback));

            let task = tokio::spawn(async move {
                Dispatcher::builder(bot, handler)
                    .dependencies(dptree::deps![engine, setup_links_dep, allowed_chat_id, bot_username])
                    .enable_ctrlc_handler()
                    .build()
                    .dispatch()
                    .await;
            });
            (frontend.clone(), frontend, Some(task))
        }
        (Some(token), None) => {
            warn!("chat.authorized_chat_id is unset; running a /link-only bootstrap bot");
            let bot = Bot::new(token);
            let setup_links_dep = setup_links.clone();
            let handler = Update::filter_message().endpoint(on_bootstrap_message);
            let task = tokio::spawn(async move {
                Dispatcher::builder(bot, handler)
                    .dependencies(dptree::deps![setup_links_dep])
                    .enable_ctrlc_handler()
                    .build()
                    .dispatch()
                    .await;
            });
            (Arc::new(NoopTeleportNotifier), Arc::new(NoopReloadNotifier), Some(task))
        }
        (None, _) => {
            warn!("chat.bot_token is unset; serving HTTP only, no chat frontend");
            (Arc::new(NoopTeleportNotifier), Arc::new(NoopReloadNotifier), None)
        }
    };

    let max_body_bytes = config.http.max_body_bytes;
    let state = AppState {
        sessions: sessions.clone(),
        connections: connections.clone(),
        reload,
        teleport,
        setup_links,
        teleport_notifier,
        reload_notifier,
        auth: Arc::new(auth),
        sse_keepalive_secs: config.sse.keepalive_secs,
        max_body_bytes,
    };

    let bind: SocketAddr = config
        .http
        .bind
        .parse()
        .with_context(|| format!("invalid http.bind address: {}", config.http.bind))?;
    let router = teleportd_server::build_router(state);

    info!(%bind, "teleportd listening");
    let serve_task = tokio::spawn(teleportd_server::serve(router, bind));

    tokio::select! {
        result = serve_task => {
            result.context("server task panicked")?.context("server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    if let Some(task) = bot_task {
        task.abort();
    }
    sessions.lock().await.save_state().await;
    Ok(())
}

async fn on_message(
    bot: Bot,
    msg: Message,
    engine: Arc<teleportd_chat::ChatEngine<TelegramFrontend>>,
    setup_links: Arc<SetupLinkRegistry>,
    allowed_chat_id: teloxide::types::ChatId,
    bot_username: String,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if let Some(token) = text.strip_prefix("/link").map(str::trim).filter(|_| text.starts_with("/link")) {
        let token = if token.is_empty() { trailing_arg(text) } else { Some(token) };
        match token {
            Some(token) => {
                let display_name = msg
                    .from()
                    .and_then(|u| u.username.clone())
                    .unwrap_or_else(|| "chat user".to_string());
                setup_links.resolve(
                    token,
                    teleportd_server::LinkedIdentity { user_id: msg.chat.id.0.to_string(), display_name },
                );
                bot.send_message(msg.chat.id, "Linked.").await?;
            }
            None => {
                bot.send_message(msg.chat.id, "Usage: /link <token>").await?;
            }
        }
        return Ok(());
    }

    if msg.chat.id != allowed_chat_id {
        return Ok(());
    }

    if let Some(cmd) = ChatCommand::parse(text, bot_username.as_str()).ok() {
        match cmd {
            ChatCommand::Start => engine.cmd_start().await,
            ChatCommand::New => engine.cmd_new().await,
            ChatCommand::Cc => engine.cmd_cc().await,
            ChatCommand::Status => engine.cmd_status().await,
            ChatCommand::Mode => engine.cmd_mode(trailing_arg(text)).await,
            ChatCommand::Model => engine.cmd_model(trailing_arg(text)).await,
            ChatCommand::Cost => engine.cmd_cost().await,
            ChatCommand::Context => engine.cmd_context().await,
            ChatCommand::Compact => engine.cmd_compact().await,
            ChatCommand::Todos => engine.cmd_todos().await,
            ChatCommand::Stop => engine.cmd_stop().await,
            ChatCommand::Cancel => engine.cmd_cancel().await,
            ChatCommand::Link => {}
        }
        return Ok(());
    }

    engine.handle_text(text).await;
    Ok(())
}

async fn on_bootstrap_message(bot: Bot, msg: Message, setup_links: Arc<SetupLinkRegistry>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !text.starts_with("/link") {
        bot.send_message(msg.chat.id, "This bot is not yet linked to a session. Send /link <token>.").await?;
        return Ok(());
    }
    match trailing_arg(text) {
        Some(token) => {
            let display_name = msg.from().and_then(|u| u.username.clone()).unwrap_or_else(|| "chat user".to_string());
            setup_links.resolve(token, teleportd_server::LinkedIdentity { user_id: msg.chat.id.0.to_string(), display_name });
            bot.send_message(
                msg.chat.id,
                format!("Linked. Add `authorized_chat_id: {}` to your config and restart.", msg.chat.id.0),
            )
            .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Usage: /link <token>").await?;
        }
    }
    Ok(())
}

async fn on_callback(
    bot: Bot,
    q: CallbackQuery,
    engine: Arc<teleportd_chat::ChatEngine<TelegramFrontend>>,
    allowed_chat_id: teloxide::types::ChatId,
    #[allow(unused_variables)] bot_username: String,
) -> ResponseResult<()> {
    let from_allowed = q
        .message
        .as_ref()
        .map(|m| m.chat().id == allowed_chat_id)
        .unwrap_or(false);
    bot.answer_callback_query(&q.id).await?;
    if !from_allowed {
        return Ok(());
    }
    if let Some(data) = &q.data {
        engine.handle_callback(data).await;
    }
    Ok(())
}
