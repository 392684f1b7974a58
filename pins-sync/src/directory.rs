//! Webhook directory: process-wide cache of delivery endpoints.
//!
//! Endpoints are registered at startup by [`WebhookDirectory::bootstrap`] and
//! by the `enable` command, looked up on every replication, and dropped by
//! `disable`. Reads vastly outnumber writes and happen from many event tasks
//! at once.

use dashmap::DashMap;

use pins_core::registry::GuildRegistry;
use pins_core::types::{GuildConfig, GuildId, WebhookCredentials, WebhookId};

use crate::transport::{WebhookInfo, WebhookTransport};

/// Whether the endpoint is known to work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Resolved,
    /// A delivery came back 401/404; skipped until registered again.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEndpoint {
    pub credentials: WebhookCredentials,
    pub name: Option<String>,
    pub state: EndpointState,
}

impl DeliveryEndpoint {
    pub fn resolved(credentials: WebhookCredentials, name: Option<String>) -> Self {
        Self {
            credentials,
            name,
            state: EndpointState::Resolved,
        }
    }

    pub fn id(&self) -> WebhookId {
        self.credentials.id
    }
}

/// Outcome of [`WebhookDirectory::bootstrap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub total: usize,
    pub succeeded: usize,
    /// Guilds whose webhook could not be resolved; their records were removed.
    pub failed: Vec<GuildId>,
}

impl BootstrapReport {
    pub fn failures(&self) -> usize {
        self.failed.len()
    }
}

#[derive(Debug, Default)]
pub struct WebhookDirectory {
    endpoints: DashMap<WebhookId, DeliveryEndpoint>,
}

impl WebhookDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite.
    pub fn register(&self, endpoint: DeliveryEndpoint) {
        self.endpoints.insert(endpoint.id(), endpoint);
    }

    /// The endpoint for `id`, if it is registered and resolved.
    pub fn resolve(&self, id: WebhookId) -> Option<DeliveryEndpoint> {
        self.endpoints
            .get(&id)
            .filter(|e| e.state == EndpointState::Resolved)
            .map(|e| e.value().clone())
    }

    pub fn unregister(&self, id: WebhookId) -> Option<DeliveryEndpoint> {
        self.endpoints.remove(&id).map(|(_, endpoint)| endpoint)
    }

    pub fn mark_unresolved(&self, id: WebhookId) {
        if let Some(mut endpoint) = self.endpoints.get_mut(&id) {
            endpoint.state = EndpointState::Unresolved;
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Resolve every configured guild's webhook against Discord.
    ///
    /// A guild whose webhook fails to resolve never aborts the pass; it is
    /// collected and, once every guild has been tried, removed from the
    /// registry together with its dedup state.
    pub async fn bootstrap(
        &self,
        configs: Vec<GuildConfig>,
        registry: &dyn GuildRegistry,
        transport: &dyn WebhookTransport,
    ) -> BootstrapReport {
        let mut report = BootstrapReport {
            total: configs.len(),
            ..BootstrapReport::default()
        };

        for config in configs {
            let credentials = config.credentials();
            match transport.fetch(&credentials).await {
                Ok(info) if belongs_to(&info, config.id) => {
                    tracing::info!(
                        guild = %config.id,
                        webhook = %credentials.id,
                        name = info.name.as_deref().unwrap_or("<unnamed>"),
                        "webhook resolved"
                    );
                    self.register(DeliveryEndpoint::resolved(credentials, info.name));
                    report.succeeded += 1;
                }
                Ok(info) => {
                    tracing::error!(
                        guild = %config.id,
                        webhook = %credentials.id,
                        webhook_guild = ?info.guild_id,
                        "webhook belongs to another guild"
                    );
                    report.failed.push(config.id);
                }
                Err(err) => {
                    tracing::error!(
                        guild = %config.id,
                        webhook = %credentials.id,
                        error = %err,
                        "unable to resolve webhook"
                    );
                    report.failed.push(config.id);
                }
            }
        }

        for guild in &report.failed {
            if let Err(err) = registry.remove(*guild) {
                tracing::error!(guild = %guild, error = %err, "failed to prune guild");
            }
        }
        for guild in &report.failed {
            if let Err(err) = registry.commit(*guild) {
                tracing::error!(guild = %guild, error = %err, "failed to commit pruned guild");
            }
        }

        tracing::info!(
            webhooks = self.len(),
            guilds = report.total,
            errors = report.failures(),
            "loaded guild webhooks"
        );
        report
    }
}

fn belongs_to(info: &WebhookInfo, guild: GuildId) -> bool {
    info.guild_id.map_or(true, |g| g == guild)
}
