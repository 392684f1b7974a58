//! # pins-sync
//!
//! The pin-replication engine.
//!
//! [`Replicator`] decides which pinned messages are new, orders them, renders
//! them with `pins-renderer` and delivers them through a [`WebhookTransport`],
//! recording each delivery in the [`GuildRegistry`](pins_core::GuildRegistry).
//! [`WebhookDirectory`] caches the delivery endpoints and prunes guilds whose
//! webhook disappeared while the bot was offline.

pub mod directory;
pub mod error;
pub mod http;
pub mod locks;
pub mod replicator;
pub mod transport;
pub mod webhook_url;

pub use directory::{BootstrapReport, DeliveryEndpoint, EndpointState, WebhookDirectory};
pub use error::{DeliveryError, ReplicateError, WebhookUrlError};
pub use http::{HttpTransport, DEFAULT_API_BASE};
pub use locks::GuildLocks;
pub use replicator::{
    IgnoreReason, IncrementalOutcome, MigrationPlan, PinSource, ReplicationReport, Replicator,
};
pub use transport::{WebhookInfo, WebhookTransport};
pub use webhook_url::parse_webhook_url;
