//! Per-guild mutual exclusion.
//!
//! Every load → mutate → commit sequence against a guild's record runs while
//! holding that guild's lock, so a pins event arriving during a manual
//! migration waits instead of reading a stale dedup set.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use pins_core::types::GuildId;

#[derive(Debug, Default)]
pub struct GuildLocks {
    locks: DashMap<GuildId, Arc<Mutex<()>>>,
}

impl GuildLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `guild`. Released when the guard drops.
    pub async fn acquire(&self, guild: GuildId) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(guild).or_default().clone();
        lock.lock_owned().await
    }
}
