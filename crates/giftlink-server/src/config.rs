//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development. A `.env` file in the working
//! directory is read first when present.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use giftlink_shared::constants::DEFAULT_HTTP_PORT;
use giftlink_store::StoreBackend;

const DEFAULT_DATABASE_PATH: &str = "./gift_bot.db";
const DEFAULT_MINI_APP_URL: &str = "https://timetoshame.github.io/GTW/frontend/index.html?v=9";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8000`
    pub http_addr: SocketAddr,

    /// Bot token. Signs launch data and authenticates the bot API.
    /// Env: `BOT_TOKEN`
    /// Default: empty (every launch string fails verification).
    pub bot_token: String,

    /// Persistence backend.
    /// Env: `DATABASE_URL` (postgres) or `DATABASE_PATH` (sqlite)
    /// Default: SQLite at `./gift_bot.db`
    pub store: StoreBackend,

    /// Page opened by the bot's web-app button.
    /// Env: `MINI_APP_URL`
    pub mini_app_url: String,

    /// Maximum accepted age of launch data.
    /// Env: `LAUNCH_DATA_MAX_AGE_SECS` (0 disables)
    /// Default: disabled
    pub launch_data_max_age: Option<Duration>,

    /// Whether the Telegram front-end runs in this process.
    /// Env: `BOT_ENABLED` (true/false)
    /// Default: `true` when a bot token is configured.
    pub bot_enabled: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("bot_token", &if self.bot_token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("store", &redacted_backend(&self.store))
            .field("mini_app_url", &self.mini_app_url)
            .field("launch_data_max_age", &self.launch_data_max_age)
            .field("bot_enabled", &self.bot_enabled)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            bot_token: String::new(),
            store: StoreBackend::Sqlite {
                path: PathBuf::from(DEFAULT_DATABASE_PATH),
            },
            mini_app_url: DEFAULT_MINI_APP_URL.to_string(),
            launch_data_max_age: None,
            bot_enabled: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(token) = var("BOT_TOKEN") {
            config.bot_token = token.trim().to_string();
        }

        match var("DATABASE_URL").filter(|url| !url.is_empty()) {
            Some(url) if is_postgres_url(&url) => {
                config.store = StoreBackend::Postgres { url };
            }
            Some(_) => {
                tracing::warn!("DATABASE_URL is not a postgres URL, using SQLite");
            }
            None => {}
        }

        if let StoreBackend::Sqlite { path } = &mut config.store {
            if let Some(custom) = var("DATABASE_PATH").filter(|p| !p.is_empty()) {
                *path = PathBuf::from(custom);
            }
        }

        if let Some(url) = var("MINI_APP_URL").filter(|u| !u.is_empty()) {
            config.mini_app_url = url;
        }

        if let Some(val) = var("LAUNCH_DATA_MAX_AGE_SECS") {
            match val.parse::<u64>() {
                Ok(0) => config.launch_data_max_age = None,
                Ok(secs) => config.launch_data_max_age = Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid LAUNCH_DATA_MAX_AGE_SECS, check disabled");
                }
            }
        }

        config.bot_enabled = match var("BOT_ENABLED") {
            Some(val) => val != "false" && val != "0",
            None => !config.bot_token.is_empty(),
        };
        if config.bot_enabled && config.bot_token.is_empty() {
            tracing::warn!("BOT_ENABLED without BOT_TOKEN, bot disabled");
            config.bot_enabled = false;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

/// Describe the backend without leaking credentials embedded in a URL.
fn redacted_backend(backend: &StoreBackend) -> String {
    match backend {
        StoreBackend::Sqlite { path } => format!("sqlite:{}", path.display()),
        StoreBackend::Postgres { url } => match url::Url::parse(url) {
            Ok(parsed) => format!(
                "postgres://{}{}",
                parsed.host_str().unwrap_or("?"),
                parsed.path()
            ),
            Err(_) => "postgres://<invalid>".to_string(),
        },
    }
}
