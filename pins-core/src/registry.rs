//! Per-guild YAML registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.gaia-pins/
//!   guilds/
//!     <guild_id>.yaml    (one record per guild: config + dedup set, mode 0600)
//! ```
//!
//! # Commit model
//!
//! `create`, `remove` and `set_include_nsfw` are durable as soon as they
//! return. `mark_replicated` only stages an entry in memory; `commit` writes
//! every staged entry for the guild in one atomic `.tmp` + `rename`. A crash
//! between the two loses the staged batch, and the next replication run will
//! deliver those pins again.
//!
//! Tests must use [`FileRegistry::open_at`] with a `TempDir`, never
//! [`FileRegistry::open`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::RegistryError;
use crate::types::{ChannelId, GuildConfig, GuildId, PinnedMessage, WebhookCredentials};

// ---------------------------------------------------------------------------
// 1. Contract
// ---------------------------------------------------------------------------

/// Persisted per-guild configuration and dedup state.
pub trait GuildRegistry: Send + Sync {
    /// Create the record for `id`. Fails with `AlreadyConfigured` if one exists.
    fn create(
        &self,
        id: GuildId,
        pins_channel: ChannelId,
        credentials: WebhookCredentials,
    ) -> Result<GuildConfig, RegistryError>;

    /// Committed record plus any entries staged since the last commit.
    fn get(&self, id: GuildId) -> Result<Option<GuildConfig>, RegistryError>;

    /// Delete the record and its dedup set. Fails with `NotConfigured` if absent.
    fn remove(&self, id: GuildId) -> Result<(), RegistryError>;

    /// Stage one replicated pin. Nothing is written until [`commit`](Self::commit).
    fn mark_replicated(&self, id: GuildId, pin: PinnedMessage) -> Result<(), RegistryError>;

    /// Persist every staged entry for `id`, all or nothing.
    fn commit(&self, id: GuildId) -> Result<(), RegistryError>;

    /// Every record, ordered by guild id.
    fn list_all(&self) -> Result<Vec<GuildConfig>, RegistryError>;

    /// Toggle NSFW channel replication. Fails with `NotConfigured` if absent.
    fn set_include_nsfw(&self, id: GuildId, include: bool)
        -> Result<GuildConfig, RegistryError>;
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.gaia-pins/`
pub fn pins_root(home: &Path) -> PathBuf {
    home.join(".gaia-pins")
}

/// `<home>/.gaia-pins/guilds/`
pub fn guilds_dir(home: &Path) -> PathBuf {
    pins_root(home).join("guilds")
}

/// `<home>/.gaia-pins/guilds/<guild_id>.yaml`. Pure, no I/O.
pub fn guild_path_at(home: &Path, id: GuildId) -> PathBuf {
    guilds_dir(home).join(format!("{id}.yaml"))
}

// ---------------------------------------------------------------------------
// 3. File-backed registry
// ---------------------------------------------------------------------------

/// [`GuildRegistry`] backed by one YAML file per guild.
#[derive(Debug)]
pub struct FileRegistry {
    home: PathBuf,
    staged: Mutex<HashMap<GuildId, Vec<PinnedMessage>>>,
}

impl FileRegistry {
    /// Open (and create if needed) the registry under `home`.
    pub fn open_at(home: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let home = home.into();
        let dir = guilds_dir(&home);
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            set_dir_permissions(&pins_root(&home))?;
            set_dir_permissions(&dir)?;
        }
        Ok(Self {
            home,
            staged: Mutex::new(HashMap::new()),
        })
    }

    /// `open_at` convenience wrapper, uses `dirs::home_dir()`.
    pub fn open() -> Result<Self, RegistryError> {
        Self::open_at(home()?)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn staged(&self) -> MutexGuard<'_, HashMap<GuildId, Vec<PinnedMessage>>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, id: GuildId) -> Result<Option<GuildConfig>, RegistryError> {
        let path = guild_path_at(&self.home, id);
        if !path.exists() {
            return Ok(None);
        }
        parse_record(&path).map(Some)
    }

    /// Atomically save a record: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
    fn save(&self, config: &GuildConfig) -> Result<(), RegistryError> {
        let path = guild_path_at(&self.home, config.id);
        let tmp_path = path.with_file_name(format!("{}.yaml.tmp", config.id));

        let yaml = serde_yaml::to_string(config)?;
        std::fs::write(&tmp_path, yaml)?;
        set_file_permissions(&tmp_path)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn with_staged(&self, mut config: GuildConfig) -> GuildConfig {
        if let Some(pending) = self.staged().get(&config.id) {
            merge_pins(&mut config, pending.iter().cloned());
        }
        config
    }
}

impl GuildRegistry for FileRegistry {
    fn create(
        &self,
        id: GuildId,
        pins_channel: ChannelId,
        credentials: WebhookCredentials,
    ) -> Result<GuildConfig, RegistryError> {
        if guild_path_at(&self.home, id).exists() {
            return Err(RegistryError::AlreadyConfigured { guild: id });
        }
        let config = GuildConfig::new(id, pins_channel, credentials);
        self.save(&config)?;
        Ok(config)
    }

    fn get(&self, id: GuildId) -> Result<Option<GuildConfig>, RegistryError> {
        Ok(self.load(id)?.map(|config| self.with_staged(config)))
    }

    fn remove(&self, id: GuildId) -> Result<(), RegistryError> {
        let path = guild_path_at(&self.home, id);
        if !path.exists() {
            return Err(RegistryError::NotConfigured { guild: id });
        }
        std::fs::remove_file(&path)?;
        self.staged().remove(&id);
        Ok(())
    }

    fn mark_replicated(&self, id: GuildId, pin: PinnedMessage) -> Result<(), RegistryError> {
        if !guild_path_at(&self.home, id).exists() {
            return Err(RegistryError::NotConfigured { guild: id });
        }
        self.staged().entry(id).or_default().push(pin);
        Ok(())
    }

    fn commit(&self, id: GuildId) -> Result<(), RegistryError> {
        let Some(pending) = self.staged().remove(&id) else {
            return Ok(());
        };
        // Removed while entries were staged: nothing left to write them into.
        let Some(mut config) = self.load(id)? else {
            return Ok(());
        };

        merge_pins(&mut config, pending.iter().cloned());
        if let Err(err) = self.save(&config) {
            // Put the batch back so a later commit can retry it.
            let mut staged = self.staged();
            let entry = staged.entry(id).or_default();
            let newer = std::mem::take(entry);
            *entry = pending;
            entry.extend(newer);
            return Err(err);
        }
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<GuildConfig>, RegistryError> {
        let dir = guilds_dir(&self.home);
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut configs = Vec::new();
        for entry in std::fs::read_dir(&dir)?.filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_record = path
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(".yaml"))
                .unwrap_or(false);
            if !is_record || !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            configs.push(self.with_staged(parse_record(&path)?));
        }
        configs.sort_by_key(|c| c.id);
        Ok(configs)
    }

    fn set_include_nsfw(
        &self,
        id: GuildId,
        include: bool,
    ) -> Result<GuildConfig, RegistryError> {
        let mut config = self
            .load(id)?
            .ok_or(RegistryError::NotConfigured { guild: id })?;
        config.include_nsfw = include;
        self.save(&config)?;
        Ok(self.with_staged(config))
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn parse_record(path: &Path) -> Result<GuildConfig, RegistryError> {
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn merge_pins(config: &mut GuildConfig, pins: impl IntoIterator<Item = PinnedMessage>) {
    for pin in pins {
        if !config.has_copied(pin.id) {
            config.pinned_messages.push(pin);
        }
    }
}

fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
