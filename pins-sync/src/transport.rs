//! Delivery seam between the replicator and Discord.

use async_trait::async_trait;

use pins_core::types::{ChannelId, GuildId, MessageId, WebhookCredentials, WebhookId};
use pins_renderer::WebhookPayload;

use crate::error::DeliveryError;

/// What Discord reports about a webhook when fetched with its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookInfo {
    pub id: WebhookId,
    pub name: Option<String>,
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
}

/// Resolves and executes webhooks. [`HttpTransport`](crate::HttpTransport) is
/// the production implementation; tests substitute fakes.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Confirm the credentials still resolve to a live webhook.
    async fn fetch(&self, credentials: &WebhookCredentials) -> Result<WebhookInfo, DeliveryError>;

    /// Post one message through the webhook and return the id of the new post.
    async fn execute(
        &self,
        credentials: &WebhookCredentials,
        payload: &WebhookPayload,
    ) -> Result<MessageId, DeliveryError>;
}
