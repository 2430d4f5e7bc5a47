//! Service configuration.
//!
//! Layered, later sources win:
//! 1. built-in defaults
//! 2. `config/stockline.{toml,json,yaml}` (optional)
//! 3. the file named by `STOCKLINE_CONFIG` (required when the variable is set)
//! 4. environment variables `STOCKLINE__SECTION__KEY`, e.g. `STOCKLINE__SYNC__INTERVAL_MS=5000`
//!
//! Durations are configured in milliseconds.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use stockline_observability::LogSettings;

use crate::reconcile::MergeSettings;
use crate::retry::{BackoffStrategy, RetryPolicy};

pub const CONFIG_PATH_ENV: &str = "STOCKLINE_CONFIG";
pub const ENV_PREFIX: &str = "STOCKLINE";
const DEFAULT_CONFIG_FILE: &str = "config/stockline";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub inventory: InventorySettings,
    pub sync: SyncSettings,
    pub notifications: NotificationSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    /// JSON seed catalog registered at boot.
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Run the background sync scheduler.
    pub enabled: bool,
    pub interval_ms: u64,
    /// Deadline for one merge batch.
    pub timeout_ms: u64,
    /// Wait for a single SKU lock before backing off.
    pub lock_wait_ms: u64,
    /// References this many generations behind are stale.
    pub stale_after_generations: u64,
    /// External source endpoint; no polling when unset.
    pub source_url: Option<String>,
    pub request_timeout_ms: u64,
    pub retry: RetrySettings,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            timeout_ms: 2_000,
            lock_wait_ms: 20,
            stale_after_generations: 2,
            source_url: None,
            request_timeout_ms: 5_000,
            retry: RetrySettings {
                max_attempts: 3,
                base_delay_ms: 250,
                max_delay_ms: 5_000,
                strategy: BackoffStrategy::Exponential,
            },
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn merge_settings(&self) -> MergeSettings {
        MergeSettings {
            timeout: Duration::from_millis(self.timeout_ms),
            lock_wait: Duration::from_millis(self.lock_wait_ms),
            stale_after: self.stale_after_generations,
            ..MergeSettings::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Webhook receiving notification payloads; logged only when unset.
    pub webhook_url: Option<String>,
    pub request_timeout_ms: u64,
    pub retry: RetrySettings,
    /// Most recent correlation ids remembered for duplicate suppression.
    pub dedupe_capacity: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            request_timeout_ms: 5_000,
            retry: RetrySettings::default(),
            dedupe_capacity: 100_000,
        }
    }
}

impl NotificationSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub strategy: BackoffStrategy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            strategy: self.strategy,
            ..RetryPolicy::default()
        }
    }
}

impl AppConfig {
    /// Load from the default file, `STOCKLINE_CONFIG` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Self::from_config(settings)
    }

    /// Parse a TOML document layered over the defaults.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Self::from_config(settings)
    }

    fn from_config(settings: Config) -> Result<Self, ConfigError> {
        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.interval_ms == 0 {
            return Err(ConfigError::Invalid("sync.interval_ms must be positive".into()));
        }
        if self.notifications.dedupe_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notifications.dedupe_capacity must be at least 1".into(),
            ));
        }
        if self.sync.stale_after_generations == 0 {
            return Err(ConfigError::Invalid(
                "sync.stale_after_generations must be at least 1".into(),
            ));
        }
        for (section, retry) in [
            ("sync.retry", &self.sync.retry),
            ("notifications.retry", &self.notifications.retry),
        ] {
            if retry.max_attempts == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{section}.max_attempts must be at least 1"
                )));
            }
        }
        Ok(())
    }
}
