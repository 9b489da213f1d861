//! Application configuration
//!
//! Compile-time constants plus the runtime configuration loaded from the
//! environment at startup.

use crate::error::{AppError, AppResult};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

/// Maximum length of a reminder message, in characters
pub const MAX_MESSAGE_LEN: usize = 150;

/// Message of the reminder injected on first launch
pub const WELCOME_MESSAGE_TEXT: &str =
    "Welcome! Type a message, then a time like 17:00, 15m or 1h30m.";

/// How far in the future the welcome reminder becomes due
pub const WELCOME_DELAY_SECS: i64 = 5;

/// Interval between wall-clock checkpoints of the engine loop
pub const DEFAULT_CHECKPOINT_SECS: u64 = 30;

/// Delay before retrying an expiration whose persistence write failed
pub const PERSIST_RETRY_SECS: i64 = 10;

/// Commands buffered between the stdin reader and the engine loop
pub const COMMAND_QUEUE_DEPTH: usize = 64;

/// Directory under the platform data dir holding the store
pub const APP_DIR_NAME: &str = "ReminderApp";

/// File holding every persisted key
pub const STORE_FILE_NAME: &str = "store.json";

/// Backup of a legacy store taken before migration
pub const LEGACY_BACKUP_FILE_NAME: &str = "store_backup_v1.json";

/// Store key of the reminder list
pub const NOTIFICATIONS_KEY: &str = "notifications";

/// Store key of the settings record
pub const SETTINGS_KEY: &str = "settings";

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub logging: LoggingConfig,
    pub checkpoint_interval: Duration,
}

impl AppConfig {
    /// Loads configuration from `REMINDER_*` environment variables.
    ///
    /// A `.env` file in the working directory is honoured outside of tests.
    pub fn from_env() -> AppResult<Self> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let data_dir = match std::env::var("REMINDER_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };

        let level = std::env::var("REMINDER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format =
            std::env::var("REMINDER_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
        if format != "pretty" && format != "json" {
            return Err(AppError::config(format!(
                "REMINDER_LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                format
            )));
        }

        let checkpoint_secs = match std::env::var("REMINDER_CHECKPOINT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                AppError::config(format!(
                    "REMINDER_CHECKPOINT_SECS must be a positive integer, got '{}'",
                    raw
                ))
            })?,
            Err(_) => DEFAULT_CHECKPOINT_SECS,
        };

        Ok(Self {
            data_dir,
            logging: LoggingConfig { level, format },
            checkpoint_interval: Duration::from_secs(checkpoint_secs),
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }
}

/// Platform data directory for the app, e.g. `~/.local/share/ReminderApp`
pub fn default_data_dir() -> AppResult<PathBuf> {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| AppError::config("Failed to get local data dir"))
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber. `RUST_LOG` overrides the level.
    ///
    /// Logs go to stderr; stdout carries outward events.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}
