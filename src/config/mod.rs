//! # Configuration Management Module
//!
//! Loads the bot configuration from a TOML file, layers environment
//! variable overrides on top, and validates the result.
//!
//! ## Configuration Structure
//!
//! - [`BotConfig`] - bot token and the admin allow-list
//! - [`TelegramConfig`] - Bot API endpoint and long-poll settings
//! - [`RconConfig`] - remote console timeouts
//! - [`StorageConfig`] - where `servers.json` lives
//! - [`SessionConfig`] - conversation idle expiry
//! - [`LoggingConfig`] - log level and optional log files
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rconbot::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("data dir: {}", config.storage.data_dir);
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bot]
//! token = ""
//! admin_ids = [123456789]
//!
//! [rcon]
//! timeout_seconds = 5
//!
//! [storage]
//! data_dir = "./data"
//! ```
//!
//! ## Environment Integration
//!
//! Precedence: environment > config file > defaults. Recognised variables
//! are `BOT_TOKEN`, `ADMIN_IDS` (comma separated), `RCON_TIMEOUT_SECONDS`
//! and `DATA_DIR`. A `.env` file is read by the binary before loading.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::profile::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub rcon: RconConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Chat platform bot token. Usually supplied through `BOT_TOKEN` instead.
    #[serde(default)]
    pub token: String,
    /// Users allowed to talk to the bot. Empty means everyone.
    #[serde(default)]
    pub admin_ids: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub api_base: String,
    /// Long-poll wait passed to `getUpdates`
    pub poll_timeout_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconConfig {
    /// Upper bound for connect + auth + command
    pub timeout_seconds: u64,
    /// Wait for a continuation packet after a full-size fragment (ms)
    #[serde(default = "default_fragment_grace_ms")]
    pub fragment_grace_ms: u64,
}

fn default_fragment_grace_ms() -> u64 {
    100
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 5,
            fragment_grace_ms: default_fragment_grace_ms(),
        }
    }
}

impl RconConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn fragment_grace(&self) -> Duration {
        Duration::from_millis(self.fragment_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub idle_timeout_minutes: u64, // 0 disables expiry
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 30,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_minutes > 0).then(|| Duration::from_secs(self.idle_timeout_minutes * 60))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("rconbot.log".to_string()),
            security_file: Some("rconbot-security.log".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig::default(),
            telegram: TelegramConfig::default(),
            rcon: RconConfig::default(),
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file, apply environment overrides, validate.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means defaults plus environment.
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            return Self::load(path).await;
        }
        let mut config = Config::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Overlay values from `lookup` (normally the process environment).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.bot.token = token.trim().to_string();
        }
        if let Some(ids) = lookup("ADMIN_IDS") {
            self.bot.admin_ids = parse_admin_ids(&ids)?;
        }
        if let Some(secs) = lookup("RCON_TIMEOUT_SECONDS") {
            self.rcon.timeout_seconds = secs
                .trim()
                .parse()
                .map_err(|_| anyhow!("RCON_TIMEOUT_SECONDS must be a whole number, got '{}'", secs))?;
        }
        if let Some(dir) = lookup("DATA_DIR").filter(|d| !d.trim().is_empty()) {
            self.storage.data_dir = dir;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rcon.timeout_seconds == 0 || self.rcon.timeout_seconds > 300 {
            return Err(anyhow!(
                "rcon.timeout_seconds must be between 1 and 300 (got {})",
                self.rcon.timeout_seconds
            ));
        }
        if self.rcon.fragment_grace_ms > 5_000 {
            return Err(anyhow!("rcon.fragment_grace_ms must be at most 5000"));
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(anyhow!("storage.data_dir cannot be empty"));
        }
        if self.telegram.poll_timeout_seconds > 50 {
            return Err(anyhow!("telegram.poll_timeout_seconds must be at most 50"));
        }
        Ok(())
    }

    /// Allow-list check. An empty list admits everyone.
    pub fn is_admin(&self, user: UserId) -> bool {
        self.bot.admin_ids.is_empty() || self.bot.admin_ids.contains(&user)
    }
}

/// Parse `"1, 2,3"` into ids. Blank entries are skipped.
pub fn parse_admin_ids(raw: &str) -> Result<Vec<UserId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<UserId>()
                .map_err(|_| anyhow!("ADMIN_IDS entry '{}' is not a user id", s))
        })
        .collect()
}
