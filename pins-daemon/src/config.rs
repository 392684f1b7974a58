//! Bot configuration.
//!
//! Read from `--config <path>` or `<home>/.gaia-pins/config.yaml`, then
//! overlaid with environment variables:
//!
//! | variable                | field              |
//! |-------------------------|--------------------|
//! | `PINS_DISCORD_TOKEN`    | `discord.token`    |
//! | `PINS_DISCORD_PREFIXES` | `discord.prefixes` (space separated) |
//! | `PINS_LOG`              | `log_filter`       |

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pins_core::registry::pins_root;
use pins_sync::DEFAULT_API_BASE;

use crate::error::{io_err, DaemonError};

pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_PREFIX: &str = "p;";
pub const DEFAULT_LOG_FILTER: &str = "info";

pub const ENV_TOKEN: &str = "PINS_DISCORD_TOKEN";
pub const ENV_PREFIXES: &str = "PINS_DISCORD_PREFIXES";
pub const ENV_LOG: &str = "PINS_LOG";

pub fn config_path_at(home: &Path) -> PathBuf {
    pins_root(home).join(CONFIG_FILE)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub prefixes: Vec<String>,
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            prefixes: vec![DEFAULT_PREFIX.to_string()],
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinsConfig {
    pub discord: DiscordConfig,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for PinsConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl PinsConfig {
    /// Load the file (explicit path, or the default location if it exists)
    /// and apply process environment overrides.
    pub fn load_at(home: &Path, explicit: Option<&Path>) -> Result<Self, DaemonError> {
        Self::load_with(home, explicit, |key| std::env::var(key).ok())
    }

    pub fn load_with(
        home: &Path,
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DaemonError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = config_path_at(home);
                match fs::read_to_string(&path) {
                    Ok(raw) => Self::parse(&path, &raw)?,
                    Err(err) if err.kind() == ErrorKind::NotFound => Self::default(),
                    Err(err) => return Err(io_err(&path, err)),
                }
            }
        };
        config.apply_env(lookup);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, DaemonError> {
        let raw = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Self::parse(path, &raw)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, DaemonError> {
        let mut config: Self = serde_yaml::from_str(raw).map_err(|source| DaemonError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        config.normalize();
        Ok(config)
    }

    /// Overlay values from `lookup` (the process environment outside tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.trim().is_empty()) {
            self.discord.token = Some(token.trim().to_string());
        }
        if let Some(prefixes) = lookup(ENV_PREFIXES) {
            self.discord.prefixes = prefixes.split_whitespace().map(str::to_string).collect();
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|f| !f.trim().is_empty()) {
            self.log_filter = filter;
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        self.discord.prefixes.retain(|p| !p.trim().is_empty());
        if self.discord.prefixes.is_empty() {
            self.discord.prefixes.push(DEFAULT_PREFIX.to_string());
        }
        if self.discord.token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            self.discord.token = None;
        }
    }

    pub fn token(&self) -> Result<&str, DaemonError> {
        self.discord.token.as_deref().ok_or(DaemonError::MissingToken)
    }

    /// The prefix quoted in replies and help text.
    pub fn primary_prefix(&self) -> &str {
        self.discord
            .prefixes
            .first()
            .map_or(DEFAULT_PREFIX, String::as_str)
    }

    /// A copy safe to print.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.discord.token.is_some() {
            copy.discord.token = Some("********".to_string());
        }
        copy
    }
}
