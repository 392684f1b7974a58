//! Domain types for GAiA Pins.
//!
//! Discord identities are 64-bit snowflakes; each kind gets its own newtype so
//! a channel id can never be passed where a guild id is expected. All types
//! that are persisted serialize via serde + serde_yaml.

use std::collections::HashSet;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Snowflake newtypes
// ---------------------------------------------------------------------------

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

snowflake!(
    /// Identity of a guild (the top-level community scope).
    GuildId
);
snowflake!(
    /// Identity of a channel inside a guild.
    ChannelId
);
snowflake!(
    /// Identity of a single message.
    MessageId
);
snowflake!(
    /// Identity of a webhook.
    WebhookId
);

// ---------------------------------------------------------------------------
// Webhook credentials
// ---------------------------------------------------------------------------

/// The id + token pair that authorizes executing a webhook.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookCredentials {
    pub id: WebhookId,
    pub token: String,
}

impl WebhookCredentials {
    pub fn new(id: impl Into<WebhookId>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
        }
    }
}

// Tokens end up in logs through `?creds` otherwise.
impl fmt::Debug for WebhookCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookCredentials")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Persisted guild record
// ---------------------------------------------------------------------------

/// One replicated pin. `new_message_id` is the post the webhook created, when
/// Discord reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedMessage {
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_message_id: Option<MessageId>,
}

impl PinnedMessage {
    pub fn new(id: MessageId, new_message_id: Option<MessageId>) -> Self {
        Self { id, new_message_id }
    }
}

/// Per-guild configuration plus the dedup set of already replicated pins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub id: GuildId,
    pub pins_channel_id: ChannelId,
    pub webhook_id: WebhookId,
    pub webhook_token: String,
    #[serde(default)]
    pub include_nsfw: bool,
    #[serde(default)]
    pub pinned_messages: Vec<PinnedMessage>,
}

impl GuildConfig {
    pub fn new(id: GuildId, pins_channel_id: ChannelId, credentials: WebhookCredentials) -> Self {
        Self {
            id,
            pins_channel_id,
            webhook_id: credentials.id,
            webhook_token: credentials.token,
            include_nsfw: false,
            pinned_messages: Vec::new(),
        }
    }

    pub fn credentials(&self) -> WebhookCredentials {
        WebhookCredentials::new(self.webhook_id, self.webhook_token.clone())
    }

    /// Snapshot of the dedup set.
    pub fn copied_message_ids(&self) -> HashSet<MessageId> {
        self.pinned_messages.iter().map(|p| p.id).collect()
    }

    pub fn has_copied(&self, id: MessageId) -> bool {
        self.pinned_messages.iter().any(|p| p.id == id)
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Coarse channel category; only text-capable kinds carry pins we mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    #[default]
    Text,
    News,
    Voice,
    Category,
    Forum,
    Other,
}

impl ChannelKind {
    pub fn is_text_capable(self) -> bool {
        matches!(self, ChannelKind::Text | ChannelKind::News)
    }
}

/// A guild channel as seen by the replicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
    pub nsfw: bool,
}

impl ChannelInfo {
    /// Text-capable, and either SFW or the guild opted into NSFW channels.
    pub fn is_eligible(&self, include_nsfw: bool) -> bool {
        self.kind.is_text_capable() && (!self.nsfw || include_nsfw)
    }
}

// ---------------------------------------------------------------------------
// Source messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub avatar_url: String,
    /// RGB accent colour; `None` or `0` means the default colour.
    pub accent_color: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    /// Pixel width; only set by Discord for media it recognised.
    pub width: Option<u32>,
}

impl Attachment {
    pub fn has_dimensions(&self) -> bool {
        self.width.is_some_and(|w| w != 0)
    }
}

/// A pinned message supplied by the platform adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub guild_id: GuildId,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
