/*
newsrelay - single-binary main.rs
This binary starts the Rocket HTTP server and runs the Telegram bot poller inside the same process.
*/

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsrelay::bot::BotHandler;
use newsrelay::events::{EventBus, EventKind};
use newsrelay::relay::NewsRelay;
use newsrelay::server::launch_rocket;
use newsrelay::store::{NewsItem, NewsStore};
use newsrelay::telegram::{run_bot, BotApi, TelegramClient};

#[derive(Parser, Debug)]
#[command(name = "newsrelay", about = "Current-news relay: Telegram bot + HTTP endpoint")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable the Telegram bot (run HTTP server only)
    #[arg(long)]
    no_bot: bool,

    /// Run the bot only (do not bind HTTP server)
    #[arg(long, conflicts_with = "no_bot")]
    bot_only: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
    if dotenv_loaded {
        info!("loaded environment from .env");
    }

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    config.validate().context("invalid configuration")?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    // The store lives for the whole process and is handed to each consumer explicitly
    let store = Arc::new(NewsStore::new(NewsItem::placeholder(&config.news)));
    let events = Arc::new(EventBus::new());
    events.subscribe(EventKind::NewsRequested, |_| {
        info!("web app requested a news refresh");
    });
    let relay = NewsRelay::new(store, events);

    let bot_enabled = config.bot.enabled && !args.no_bot;
    if args.bot_only && !bot_enabled {
        anyhow::bail!("--bot-only given but the bot is disabled in configuration");
    }

    let bot_api: Option<Arc<dyn BotApi>> = if bot_enabled {
        let token_env = config.bot.token_env();
        let token = match std::env::var(token_env) {
            Ok(t) if !t.trim().is_empty() => t,
            _ => {
                error!(token_env, "bot token not found in environment");
                anyhow::bail!("Bot token env var '{}' not set", token_env);
            }
        };
        let api: Arc<dyn BotApi> = Arc::new(TelegramClient::new(config.bot.api_url(), token));
        info!(api_url = config.bot.api_url(), "Telegram client initialized");
        Some(api)
    } else {
        info!("Telegram bot disabled");
        None
    };

    let webapp_url = config.bot.resolve_webapp_url();
    let poll_timeout = config.bot.poll_timeout_seconds();
    let shutdown_notify = Arc::new(Notify::new());

    if args.bot_only {
        let Some(api) = bot_api else {
            anyhow::bail!("bot-only mode requires an enabled bot");
        };
        info!("Starting in bot-only mode");
        let handler = BotHandler::new(relay.clone(), webapp_url);

        let signal_notify = shutdown_notify.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, notifying bot to shutdown");
                signal_notify.notify_waiters();
            }
        });

        if let Err(e) = run_bot(api, handler, poll_timeout, shutdown_notify.clone()).await {
            error!(%e, "bot encountered an error");
        }
        info!("bot-only run finished");
        return Ok(());
    }

    let mut bot_handle = None;
    if let Some(api) = bot_api {
        info!("Spawning bot polling task");
        let handler = BotHandler::new(relay.clone(), webapp_url);
        let b_shutdown = shutdown_notify.clone();
        bot_handle = Some(tokio::spawn(async move {
            let res = run_bot(api, handler, poll_timeout, b_shutdown).await;
            if let Err(e) = &res {
                error!(%e, "bot polling failed");
            }
            res
        }));
    }

    // Launch the Rocket server (blocking until Rocket shuts down; Rocket handles ctrl-c itself)
    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(relay, &config, bot_enabled).await {
        error!(%e, "Rocket server failed");
    }

    info!("HTTP server stopped; notifying bot to shutdown");
    shutdown_notify.notify_waiters();

    if let Some(handle) = bot_handle {
        match tokio::time::timeout(Duration::from_secs(20), handle).await {
            Ok(join_res) => match join_res {
                Ok(Ok(())) => info!("bot exited cleanly"),
                Ok(Err(e)) => error!(%e, "bot task returned an error"),
                Err(join_err) => error!(%join_err, "bot task panicked"),
            },
            Err(_) => {
                info!("Timed out waiting for bot to exit; continuing shutdown");
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}
