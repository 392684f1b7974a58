//! Error types for pins-sync.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

use pins_core::error::RegistryError;
use pins_core::types::{GuildId, MessageId, WebhookId};

/// Failures talking to a webhook endpoint.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The token was rejected (401): the webhook was regenerated or revoked.
    #[error("webhook credentials were rejected")]
    Unauthorized,

    /// The webhook no longer exists (404).
    #[error("webhook not found")]
    NotFound,

    /// Still rate limited after the retry budget was spent.
    #[error("rate limited by Discord; retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Any other non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS or timeout failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A success response whose body could not be understood.
    #[error("malformed webhook response: {0}")]
    Decode(String),
}

impl DeliveryError {
    /// True when the endpoint itself is gone, as opposed to a transient failure.
    pub fn is_endpoint_gone(&self) -> bool {
        matches!(self, DeliveryError::Unauthorized | DeliveryError::NotFound)
    }
}

/// Why a webhook URL could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookUrlError {
    #[error("not a URL: {0}")]
    Malformed(String),

    #[error("webhook URLs must use https")]
    InsecureScheme,

    #[error("'{0}' is not a Discord host")]
    UnknownHost(String),

    #[error("expected /api/webhooks/<id>/<token>")]
    BadPath,
}

/// Errors surfaced by the [`Replicator`](crate::Replicator).
#[derive(Debug, Error)]
pub enum ReplicateError {
    /// The guild has no configuration.
    #[error("guild {guild} is not configured")]
    NotConfigured { guild: GuildId },

    /// The guild's webhook is not registered (or no longer resolves).
    #[error("webhook {webhook} is unavailable")]
    EndpointUnavailable { webhook: WebhookId },

    /// Delivering one message failed; the rest of the run was abandoned.
    #[error("failed to deliver message {message}: {source}")]
    Delivery {
        message: MessageId,
        #[source]
        source: DeliveryError,
    },

    /// An error from the registry.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Reading channels or pins from the platform failed.
    #[error("platform call failed: {context}: {source}")]
    Platform {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ReplicateError {
    #[must_use]
    pub fn platform(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Platform {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
