use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Record key the sync cursor is stored under.
pub const DEFAULT_CURSOR_KEY: &str = "keria-notification-marker";

/// Synchronization configuration, loaded from environment variables
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Sleep between feed polls when offline or when no new events arrived
    pub poll_interval: Duration,
    /// Sleep between checks while logged out
    pub login_poll_interval: Duration,
    /// Number of feed items requested per window
    pub window_size: u64,
    /// Cursor store key
    pub cursor_key: String,
    /// Sleep between operation poller iterations
    pub operation_poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            login_poll_interval: Duration::from_millis(25),
            window_size: 24,
            cursor_key: DEFAULT_CURSOR_KEY.to_string(),
            operation_poll_interval: Duration::from_millis(250),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();

        Ok(Self {
            poll_interval: env_millis("SYNC_POLL_INTERVAL_MS")?.unwrap_or(defaults.poll_interval),
            login_poll_interval: env_millis("SYNC_LOGIN_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.login_poll_interval),
            window_size: env_parse("SYNC_WINDOW_SIZE")?.unwrap_or(defaults.window_size),
            cursor_key: env::var("SYNC_CURSOR_KEY").unwrap_or(defaults.cursor_key),
            operation_poll_interval: env_millis("OPERATION_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.operation_poll_interval),
        }
        .validated()?)
    }

    fn validated(self) -> Result<Self> {
        anyhow::ensure!(self.window_size >= 2, "SYNC_WINDOW_SIZE must be at least 2");
        Ok(self)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(None),
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_millis))
}
