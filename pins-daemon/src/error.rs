use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

use pins_core::RegistryError;
use pins_sync::{DeliveryError, ReplicateError};

/// Error surface for configuration loading and the bot runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no Discord bot token configured (set discord.token or PINS_DISCORD_TOKEN)")]
    MissingToken,

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("webhook transport error: {0}")]
    Transport(#[from] DeliveryError),

    #[error("discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Command failures
// ---------------------------------------------------------------------------

pub const PERMISSION_DENIED: &str =
    "It looks like either you or the bot don't have permission to run this command! Sorry!";

/// A command that did not succeed. Every variant maps to one reply.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Already/not configured, bad arguments. The message is the reply.
    #[error("{0}")]
    Configuration(String),

    /// The invoking member or the bot lacks a required permission.
    #[error("missing permissions")]
    Permission,

    /// A webhook could not be created or resolved. The message is the reply.
    #[error("{0}")]
    Endpoint(String),

    /// Anything else.
    #[error("{kind} failure: {source}")]
    Execution {
        kind: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl CommandError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn execution(kind: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Execution {
            kind,
            source: Box::new(source),
        }
    }

    /// Text sent back to the channel the command came from.
    pub fn reply(&self) -> String {
        match self {
            CommandError::Configuration(message) | CommandError::Endpoint(message) => {
                message.clone()
            }
            CommandError::Permission => PERMISSION_DENIED.to_string(),
            CommandError::Execution { kind, .. } => format!(
                "Something went wrong while running that command ({kind}). This is probably my fault."
            ),
        }
    }
}

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyConfigured { .. } => {
                CommandError::configuration(crate::commands::ALREADY_ENABLED)
            }
            RegistryError::NotConfigured { .. } => {
                CommandError::configuration(crate::commands::NOT_ENABLED)
            }
            other => CommandError::execution("registry", other),
        }
    }
}

impl From<ReplicateError> for CommandError {
    fn from(err: ReplicateError) -> Self {
        match err {
            ReplicateError::NotConfigured { .. } => {
                CommandError::configuration(crate::commands::NOT_ENABLED)
            }
            ReplicateError::EndpointUnavailable { .. } => {
                CommandError::Endpoint(crate::commands::WEBHOOK_UNAVAILABLE.to_string())
            }
            ReplicateError::Registry(inner) => inner.into(),
            delivery @ ReplicateError::Delivery { .. } => {
                CommandError::execution("delivery", delivery)
            }
            platform @ ReplicateError::Platform { .. } => {
                CommandError::execution("discord", platform)
            }
        }
    }
}

impl From<serenity::Error> for CommandError {
    fn from(err: serenity::Error) -> Self {
        CommandError::execution("discord", err)
    }
}
