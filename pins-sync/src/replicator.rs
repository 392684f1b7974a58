//! Pin replication: bulk migration and incremental updates.
//!
//! ## Run protocol (both entry points)
//!
//! 1. Take the guild lock.
//! 2. Load the guild config.
//! 3. Resolve the delivery endpoint.
//! 4. Keep eligible channels (text-capable; NSFW only when opted in).
//! 5. Drop pins already in the dedup set.
//! 6. Order oldest-first.
//! 7. Render → deliver → stage, one message at a time.
//! 8. Commit once, even when step 7 stopped early.
//!
//! A failed delivery ends the run. Whatever was delivered before it is
//! committed, so the next trigger resumes at the failed message and the feed
//! never goes out of order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use pins_core::registry::GuildRegistry;
use pins_core::types::{ChannelInfo, GuildConfig, GuildId, MessageId, PinnedMessage, SourceMessage};
use pins_renderer::{render, SenderIdentity, WebhookPayload};

use crate::directory::{DeliveryEndpoint, WebhookDirectory};
use crate::error::ReplicateError;
use crate::locks::GuildLocks;
use crate::transport::WebhookTransport;

/// Supplies the currently pinned messages of a channel.
#[async_trait]
pub trait PinSource: Send + Sync {
    async fn pinned_messages(
        &self,
        channel: &ChannelInfo,
    ) -> Result<Vec<SourceMessage>, ReplicateError>;
}

/// Result of a run that reached the delivery stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationReport {
    pub guild: GuildId,
    pub delivered: usize,
}

/// Why an event-triggered run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotConfigured,
    /// The channel belongs to a different guild than the event claimed.
    ForeignChannel,
    IneligibleChannel,
    EndpointUnavailable,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::NotConfigured => write!(f, "the guild isn't configured"),
            IgnoreReason::ForeignChannel => write!(f, "the channel is in another guild"),
            IgnoreReason::IneligibleChannel => {
                write!(f, "the channel isn't a text channel or is marked NSFW")
            }
            IgnoreReason::EndpointUnavailable => write!(f, "the webhook is unavailable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementalOutcome {
    Replicated(ReplicationReport),
    Ignored(IgnoreReason),
}

/// A migration that has been loaded, filtered, deduplicated and ordered but
/// not yet delivered. Holds the guild lock until executed or dropped.
pub struct MigrationPlan {
    guild: GuildId,
    endpoint: DeliveryEndpoint,
    channel_count: usize,
    messages: Vec<SourceMessage>,
    _guard: OwnedMutexGuard<()>,
}

impl MigrationPlan {
    pub fn guild(&self) -> GuildId {
        self.guild
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Messages in delivery order.
    pub fn messages(&self) -> &[SourceMessage] {
        &self.messages
    }
}

impl fmt::Debug for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationPlan")
            .field("guild", &self.guild)
            .field("webhook", &self.endpoint.id())
            .field("channel_count", &self.channel_count)
            .field("message_count", &self.messages.len())
            .finish()
    }
}

pub struct Replicator {
    registry: Arc<dyn GuildRegistry>,
    directory: Arc<WebhookDirectory>,
    transport: Arc<dyn WebhookTransport>,
    locks: GuildLocks,
}

impl Replicator {
    pub fn new(
        registry: Arc<dyn GuildRegistry>,
        directory: Arc<WebhookDirectory>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self {
            registry,
            directory,
            transport,
            locks: GuildLocks::new(),
        }
    }

    pub fn registry(&self) -> &dyn GuildRegistry {
        self.registry.as_ref()
    }

    pub fn directory(&self) -> &WebhookDirectory {
        &self.directory
    }

    pub fn transport(&self) -> &dyn WebhookTransport {
        self.transport.as_ref()
    }

    /// Exclusive access to `guild`'s record. Commands that touch the registry
    /// outside a replication run hold this too.
    pub async fn lock(&self, guild: GuildId) -> OwnedMutexGuard<()> {
        self.locks.acquire(guild).await
    }

    // -----------------------------------------------------------------------
    // Bulk migration
    // -----------------------------------------------------------------------

    /// Steps 1–6 for every channel in `candidates`.
    pub async fn plan_migration(
        &self,
        guild: GuildId,
        candidates: &[ChannelInfo],
        pins: &dyn PinSource,
    ) -> Result<MigrationPlan, ReplicateError> {
        let guard = self.lock(guild).await;
        let config = self
            .registry
            .get(guild)?
            .ok_or(ReplicateError::NotConfigured { guild })?;
        let endpoint = self.endpoint_for(&config)?;

        let channels: Vec<&ChannelInfo> = candidates
            .iter()
            .filter(|c| c.guild_id == guild && c.is_eligible(config.include_nsfw))
            .collect();

        let mut messages = Vec::new();
        for channel in &channels {
            messages.extend(pins.pinned_messages(channel).await?);
        }

        let messages = fresh_messages(&config, messages);
        let messages = chronological(messages);

        tracing::info!(
            guild = %guild,
            channels = channels.len(),
            messages = messages.len(),
            "migration planned"
        );

        Ok(MigrationPlan {
            guild,
            endpoint,
            channel_count: channels.len(),
            messages,
            _guard: guard,
        })
    }

    /// Steps 7–8 for a plan; releases the guild lock when done.
    pub async fn execute(
        &self,
        plan: MigrationPlan,
        sender: &SenderIdentity,
    ) -> Result<ReplicationReport, ReplicateError> {
        let MigrationPlan {
            guild,
            endpoint,
            messages,
            _guard,
            ..
        } = plan;
        let delivered = self.deliver_all(guild, &endpoint, messages, sender).await?;
        Ok(ReplicationReport { guild, delivered })
    }

    /// Plan and execute in one call.
    pub async fn migrate(
        &self,
        guild: GuildId,
        candidates: &[ChannelInfo],
        pins: &dyn PinSource,
        sender: &SenderIdentity,
    ) -> Result<ReplicationReport, ReplicateError> {
        let plan = self.plan_migration(guild, candidates, pins).await?;
        self.execute(plan, sender).await
    }

    // -----------------------------------------------------------------------
    // Incremental updates
    // -----------------------------------------------------------------------

    /// Mirror new pins of one channel after a pins-update event.
    ///
    /// `changed_pins` is the channel's current pin list as Discord returns it,
    /// newest first. Nothing is waiting on the result, so a guild that isn't
    /// set up or a channel that doesn't qualify yields
    /// [`IncrementalOutcome::Ignored`] rather than an error.
    pub async fn on_pins_changed(
        &self,
        guild: GuildId,
        channel: &ChannelInfo,
        changed_pins: Vec<SourceMessage>,
        sender: &SenderIdentity,
    ) -> Result<IncrementalOutcome, ReplicateError> {
        let _guard = self.lock(guild).await;

        let Some(config) = self.registry.get(guild)? else {
            return Ok(ignored(guild, channel, IgnoreReason::NotConfigured));
        };
        if channel.guild_id != guild {
            return Ok(ignored(guild, channel, IgnoreReason::ForeignChannel));
        }
        if !channel.is_eligible(config.include_nsfw) {
            return Ok(ignored(guild, channel, IgnoreReason::IneligibleChannel));
        }
        let Ok(endpoint) = self.endpoint_for(&config) else {
            return Ok(ignored(guild, channel, IgnoreReason::EndpointUnavailable));
        };

        let mut oldest_first = changed_pins;
        oldest_first.reverse();
        let messages = fresh_messages(&config, oldest_first);

        let delivered = self.deliver_all(guild, &endpoint, messages, sender).await?;
        Ok(IncrementalOutcome::Replicated(ReplicationReport {
            guild,
            delivered,
        }))
    }

    // -----------------------------------------------------------------------
    // Shared delivery loop
    // -----------------------------------------------------------------------

    fn endpoint_for(&self, config: &GuildConfig) -> Result<DeliveryEndpoint, ReplicateError> {
        self.directory
            .resolve(config.webhook_id)
            .ok_or(ReplicateError::EndpointUnavailable {
                webhook: config.webhook_id,
            })
    }

    async fn deliver_all(
        &self,
        guild: GuildId,
        endpoint: &DeliveryEndpoint,
        messages: Vec<SourceMessage>,
        sender: &SenderIdentity,
    ) -> Result<usize, ReplicateError> {
        let mut delivered = 0;
        let mut failure = None;

        for message in messages {
            let payload = WebhookPayload::new(&render(&message), sender);
            let new_id = match self.transport.execute(&endpoint.credentials, &payload).await {
                Ok(new_id) => new_id,
                Err(err) => {
                    if err.is_endpoint_gone() {
                        self.directory.mark_unresolved(endpoint.id());
                    }
                    failure = Some(ReplicateError::Delivery {
                        message: message.id,
                        source: err,
                    });
                    break;
                }
            };
            tracing::debug!(guild = %guild, message = %message.id, post = %new_id, "pin copied");

            if let Err(err) = self
                .registry
                .mark_replicated(guild, PinnedMessage::new(message.id, Some(new_id)))
            {
                failure = Some(err.into());
                break;
            }
            delivered += 1;
        }

        let committed = self.registry.commit(guild);
        if let Some(err) = failure {
            if let Err(commit_err) = committed {
                tracing::error!(guild = %guild, error = %commit_err, "commit after failed run failed");
            }
            tracing::warn!(guild = %guild, delivered, error = %err, "replication stopped early");
            return Err(err);
        }
        committed?;

        if delivered > 0 {
            tracing::info!(guild = %guild, delivered, "pins replicated");
        }
        Ok(delivered)
    }
}

fn ignored(guild: GuildId, channel: &ChannelInfo, reason: IgnoreReason) -> IncrementalOutcome {
    tracing::info!(
        guild = %guild,
        channel = %channel.id,
        name = %channel.name,
        "ignoring pins update because {reason}"
    );
    IncrementalOutcome::Ignored(reason)
}

/// Drop messages already replicated (and repeats within the batch), keeping order.
fn fresh_messages(config: &GuildConfig, messages: Vec<SourceMessage>) -> Vec<SourceMessage> {
    let mut seen: HashSet<MessageId> = config.copied_message_ids();
    messages
        .into_iter()
        .filter(|m| seen.insert(m.id))
        .collect()
}

/// Oldest first. Stable, so equal timestamps keep their fetch order.
fn chronological(mut messages: Vec<SourceMessage>) -> Vec<SourceMessage> {
    messages.sort_by_key(|m| m.timestamp);
    messages
}
