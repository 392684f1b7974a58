//! Shared fakes for replicator integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use pins_core::{
    Author, ChannelId, ChannelInfo, ChannelKind, FileRegistry, GuildId, GuildRegistry, MessageId,
    SourceMessage, WebhookCredentials, WebhookId,
};
use pins_renderer::{SenderIdentity, WebhookPayload};
use pins_sync::{
    DeliveryEndpoint, DeliveryError, PinSource, ReplicateError, Replicator, WebhookDirectory,
    WebhookInfo, WebhookTransport,
};

pub const GUILD: GuildId = GuildId(100);
pub const WEBHOOK: WebhookId = WebhookId(500);

/// Records every execute call; can be told to fail.
#[derive(Default)]
pub struct FakeTransport {
    pub sent: Mutex<Vec<(WebhookId, WebhookPayload)>>,
    /// Execute fails once this many posts have gone out.
    pub fail_after: Mutex<Option<usize>>,
    /// Execute answers 404 instead of a transient error.
    pub endpoint_gone: Mutex<bool>,
    /// Webhooks whose fetch fails.
    pub dead_webhooks: Mutex<HashSet<WebhookId>>,
    /// Webhooks that report a different guild on fetch.
    pub foreign_webhooks: Mutex<HashMap<WebhookId, GuildId>>,
    next_id: AtomicU64,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(n);
    }

    pub fn heal(&self) {
        *self.fail_after.lock().unwrap() = None;
    }

    /// Original message ids, in delivery order, recovered from the embed link.
    pub fn delivered_ids(&self) -> Vec<u64> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| {
                let link = &payload.embeds[0].author.url;
                link.rsplit('/').next().unwrap().parse().unwrap()
            })
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for FakeTransport {
    async fn fetch(&self, credentials: &WebhookCredentials) -> Result<WebhookInfo, DeliveryError> {
        if self.dead_webhooks.lock().unwrap().contains(&credentials.id) {
            return Err(DeliveryError::Unauthorized);
        }
        let guild_id = self.foreign_webhooks.lock().unwrap().get(&credentials.id).copied();
        Ok(WebhookInfo {
            id: credentials.id,
            name: Some("GAiA Pins".into()),
            guild_id,
            channel_id: None,
        })
    }

    async fn execute(
        &self,
        credentials: &WebhookCredentials,
        payload: &WebhookPayload,
    ) -> Result<MessageId, DeliveryError> {
        // Give concurrent runs a chance to interleave.
        tokio::task::yield_now().await;

        let sent_so_far = self.sent.lock().unwrap().len();
        let fail_after = *self.fail_after.lock().unwrap();
        let endpoint_gone = *self.endpoint_gone.lock().unwrap();
        if let Some(limit) = fail_after {
            if sent_so_far >= limit {
                if endpoint_gone {
                    return Err(DeliveryError::NotFound);
                }
                return Err(DeliveryError::Status {
                    status: 502,
                    body: "bad gateway".into(),
                });
            }
        }
        self.sent
            .lock()
            .unwrap()
            .push((credentials.id, payload.clone()));
        Ok(MessageId(10_000 + self.next_id.fetch_add(1, Ordering::SeqCst)))
    }
}

/// Pins keyed by channel; records which channels were asked.
#[derive(Default)]
pub struct FakePins {
    pub pins: HashMap<ChannelId, Vec<SourceMessage>>,
    pub asked: Mutex<Vec<ChannelId>>,
}

#[async_trait]
impl PinSource for FakePins {
    async fn pinned_messages(
        &self,
        channel: &ChannelInfo,
    ) -> Result<Vec<SourceMessage>, ReplicateError> {
        self.asked.lock().unwrap().push(channel.id);
        Ok(self.pins.get(&channel.id).cloned().unwrap_or_default())
    }
}

pub struct Harness {
    pub home: TempDir,
    pub registry: Arc<FileRegistry>,
    pub directory: Arc<WebhookDirectory>,
    pub transport: Arc<FakeTransport>,
    pub replicator: Arc<Replicator>,
}

impl Harness {
    /// A harness with [`GUILD`] enabled and its webhook registered.
    pub fn configured() -> Self {
        let harness = Self::empty();
        harness
            .registry
            .create(GUILD, ChannelId(1), WebhookCredentials::new(WEBHOOK, "tok"))
            .unwrap();
        harness.directory.register(DeliveryEndpoint::resolved(
            WebhookCredentials::new(WEBHOOK, "tok"),
            None,
        ));
        harness
    }

    pub fn empty() -> Self {
        let home = TempDir::new().unwrap();
        let registry = Arc::new(FileRegistry::open_at(home.path()).unwrap());
        let directory = Arc::new(WebhookDirectory::new());
        let transport = FakeTransport::new();
        let replicator = Arc::new(Replicator::new(
            registry.clone(),
            directory.clone(),
            transport.clone(),
        ));
        Self {
            home,
            registry,
            directory,
            transport,
            replicator,
        }
    }

    /// Dedup set as persisted on disk (ignores anything merely staged).
    pub fn committed_ids(&self) -> Vec<u64> {
        let fresh = FileRegistry::open_at(self.home.path()).unwrap();
        let mut ids: Vec<u64> = fresh
            .get(GUILD)
            .unwrap()
            .map(|c| c.pinned_messages.iter().map(|p| p.id.get()).collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }
}

pub fn sender() -> SenderIdentity {
    SenderIdentity {
        name: "GAiA".into(),
        avatar_url: None,
    }
}

pub fn channel(id: u64, nsfw: bool) -> ChannelInfo {
    ChannelInfo {
        id: ChannelId(id),
        guild_id: GUILD,
        name: format!("channel-{id}"),
        kind: ChannelKind::Text,
        nsfw,
    }
}

pub fn pin(id: u64, channel: u64, secs: i64) -> SourceMessage {
    SourceMessage {
        id: MessageId(id),
        channel_id: ChannelId(channel),
        channel_name: format!("channel-{channel}"),
        guild_id: GUILD,
        author: Author {
            name: "someone".into(),
            avatar_url: "https://cdn.example/a.png".into(),
            accent_color: None,
        },
        timestamp: Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap(),
        content: format!("message {id}"),
        attachments: vec![],
    }
}
