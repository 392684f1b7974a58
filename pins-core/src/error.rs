//! Error types for pins-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::GuildId;

/// All errors that can arise from guild registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (commit path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse guild record at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, cannot locate `~/.gaia-pins/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// `create` was called for a guild that already has a record.
    #[error("guild {guild} is already configured")]
    AlreadyConfigured { guild: GuildId },

    /// The guild has no record.
    #[error("guild {guild} is not configured")]
    NotConfigured { guild: GuildId },
}
