//! GAiA Pins core library: domain types, guild registry persistence, errors.
//!
//! Public API surface:
//! - [`types`]: snowflake newtypes, guild configuration and source messages
//! - [`error`]: [`RegistryError`]
//! - [`registry`]: the [`GuildRegistry`] contract and its YAML-file store

pub mod error;
pub mod registry;
pub mod types;

pub use error::RegistryError;
pub use registry::{FileRegistry, GuildRegistry};
pub use types::{
    Attachment, Author, ChannelId, ChannelInfo, ChannelKind, GuildConfig, GuildId, MessageId,
    PinnedMessage, SourceMessage, WebhookCredentials, WebhookId,
};
