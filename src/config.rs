//! Configuration file for ~/.config/gator/config.toml.
//!
//! The file is optional; a missing file yields `Config::default()`. Unknown
//! keys are accepted, but a warning is logged for each so typos surface.
//! `register` and `login` write it back to record the current user.
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{FetcherConfig, DEFAULT_MAX_FEED_SIZE, DEFAULT_USER_AGENT};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: &'static str },

    #[error("HOME environment variable not set")]
    NoHome,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Relative paths resolve against the working directory.
    pub database_path: PathBuf,

    /// Name recorded by `login`/`register`. Unset until one of them runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,

    /// `User-Agent` sent with every feed request.
    pub user_agent: String,

    /// Upper bound on one feed download, body included.
    pub fetch_timeout_secs: u64,

    pub max_feed_size_bytes: usize,

    /// Allow `addfeed` to accept loopback and private-network hosts.
    pub allow_private_hosts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_dir()
                .map(|dir| dir.join("gator.db"))
                .unwrap_or_else(|_| PathBuf::from("gator.db")),
            current_user_name: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout_secs: 30,
            max_feed_size_bytes: DEFAULT_MAX_FEED_SIZE,
            allow_private_hosts: false,
        }
    }
}

/// `~/.config/gator`
pub fn default_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".config").join("gator"))
}

/// `~/.config/gator/config.toml`
pub fn default_path() -> Result<PathBuf, ConfigError> {
    Ok(default_dir()?.join("config.toml"))
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "database_path",
        "current_user_name",
        "user_agent",
        "fetch_timeout_secs",
        "max_feed_size_bytes",
        "allow_private_hosts",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty or whitespace-only file → `Ok(Config::default())`
    /// - Larger than 1 MB → `Err(ConfigError::TooLarge)`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Zero timeout or size limit → `Err(ConfigError::InvalidValue)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to bound memory use
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            database = %config.database_path.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reject settings that would make every fetch fail.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch_timeout_secs",
                reason: "must be at least 1",
            });
        }
        if self.max_feed_size_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_feed_size_bytes",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Write the configuration to `path`, creating the parent directory.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a crash never leaves a truncated config behind.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;

        // Unpredictable temp name; create_new refuses to follow a planted file
        let suffix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = path.with_extension(format!("tmp.{:016x}", suffix));

        let write_result = (|| -> std::io::Result<()> {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            drop(file);

            #[cfg(windows)]
            if path.exists() {
                std::fs::remove_file(path)?;
            }

            std::fs::rename(&temp_path, path)
        })();

        if let Err(e) = write_result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(ConfigError::Io(e));
        }

        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_size: self.max_feed_size_bytes,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
