//! # giftlink-server
//!
//! Backend of the gift-picking Mini App.
//!
//! This binary provides:
//! - **REST API** (axum) for managing a user's close people and accepting
//!   invitation links, authenticated by signed Mini App launch data
//! - **Bot front-end** (teloxide) handling `/start`, invite deep links, and
//!   payloads posted back from the Mini App
//! - **Persistence** through `giftlink-store`, on SQLite or PostgreSQL

mod api;
mod auth;
mod bot;
mod config;
mod error;
mod notify;
mod service;

use std::sync::Arc;

use anyhow::Context;
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::EnvFilter;

use giftlink_shared::constants::APP_NAME;
use giftlink_shared::LaunchDataVerifier;
use giftlink_store::open_store;

use crate::api::AppState;
use crate::bot::GiftBot;
use crate::config::ServerConfig;
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::service::ContactService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,giftlink_server=debug,giftlink_store=debug")
        }))
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.bot_token.is_empty() {
        tracing::warn!("BOT_TOKEN is not set, every authenticated request will be rejected");
    }

    // -----------------------------------------------------------------------
    // 3. Open the store (migrations run here)
    // -----------------------------------------------------------------------
    // The synchronous postgres client drives its own runtime, so it is
    // created off the async workers.
    let backend = config.store.clone();
    let store = tokio::task::spawn_blocking(move || open_store(&backend))
        .await
        .context("store initialization task failed")??;

    // -----------------------------------------------------------------------
    // 4. Wire up the service, API state, and bot
    // -----------------------------------------------------------------------
    let bot = config.bot_enabled.then(|| Bot::new(config.bot_token.clone()));

    let notifier: Arc<dyn Notifier> = match &bot {
        Some(bot) => Arc::new(TelegramNotifier::new(bot.clone())),
        None => Arc::new(LogNotifier),
    };
    let service = Arc::new(ContactService::new(Arc::clone(&store), notifier));

    let mut verifier = LaunchDataVerifier::new(config.bot_token.clone());
    if let Some(max_age) = config.launch_data_max_age {
        verifier = verifier.with_max_age(max_age);
    }

    let app_state = AppState {
        service: Arc::clone(&service),
        verifier: Arc::new(verifier),
    };

    let gift_bot = match bot {
        Some(bot) => {
            let mini_app_url = url::Url::parse(&config.mini_app_url)
                .with_context(|| format!("invalid MINI_APP_URL {:?}", config.mini_app_url))?;
            Some(Arc::new(GiftBot::new(bot, service, mini_app_url)))
        }
        None => {
            info!("Bot front-end disabled");
            None
        }
    };

    let bot_task = async move {
        match gift_bot {
            Some(gift_bot) => gift_bot.start().await,
            None => std::future::pending().await,
        }
    };

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API and the bot until one stops or Ctrl+C arrives
    // -----------------------------------------------------------------------
    let result = tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = &result {
                tracing::error!(error = %e, "HTTP server failed");
            }
            result
        }
        _ = bot_task => {
            info!("Bot dispatcher stopped, shutting down");
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    // Last reference to the store; see step 3.
    tokio::task::spawn_blocking(move || drop(store)).await?;

    result
}
