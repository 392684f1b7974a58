//! `gaia-pins guilds` and `gaia-pins forget`: offline registry maintenance.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use pins_core::{FileRegistry, GuildConfig, GuildId, GuildRegistry, RegistryError};

/// Arguments for `gaia-pins guilds`.
#[derive(Args, Debug)]
pub struct GuildsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct GuildJson {
    id: GuildId,
    pins_channel_id: u64,
    webhook_id: u64,
    include_nsfw: bool,
    copied: usize,
}

#[derive(Tabled)]
struct GuildRow {
    #[tabled(rename = "guild")]
    guild: String,
    #[tabled(rename = "pins channel")]
    channel: String,
    #[tabled(rename = "webhook")]
    webhook: String,
    #[tabled(rename = "nsfw")]
    nsfw: String,
    #[tabled(rename = "copied")]
    copied: usize,
}

impl GuildsArgs {
    pub fn run(self) -> Result<()> {
        let registry = open_registry()?;
        let guilds = registry.list_all().context("failed to read guild registry")?;

        if self.json {
            let payload: Vec<GuildJson> = guilds.iter().map(to_json).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize guilds JSON")?
            );
            return Ok(());
        }

        if guilds.is_empty() {
            println!("No guilds configured.");
            return Ok(());
        }

        let rows: Vec<GuildRow> = guilds.iter().map(to_row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{} guilds configured", guilds.len());
        Ok(())
    }
}

fn to_json(config: &GuildConfig) -> GuildJson {
    GuildJson {
        id: config.id,
        pins_channel_id: config.pins_channel_id.get(),
        webhook_id: config.webhook_id.get(),
        include_nsfw: config.include_nsfw,
        copied: config.pinned_messages.len(),
    }
}

fn to_row(config: &GuildConfig) -> GuildRow {
    GuildRow {
        guild: config.id.to_string(),
        channel: config.pins_channel_id.to_string(),
        webhook: config.webhook_id.to_string(),
        nsfw: if config.include_nsfw {
            "included".yellow().to_string()
        } else {
            "excluded".to_string()
        },
        copied: config.pinned_messages.len(),
    }
}

/// Arguments for `gaia-pins forget`.
#[derive(Args, Debug)]
pub struct ForgetArgs {
    /// Guild (server) id.
    pub guild: GuildId,
}

impl ForgetArgs {
    pub fn run(self) -> Result<()> {
        let registry = open_registry()?;
        match registry.remove(self.guild) {
            Ok(()) => {
                println!("{} guild {}", "forgot".green(), self.guild);
                Ok(())
            }
            Err(RegistryError::NotConfigured { .. }) => {
                anyhow::bail!("guild {} is not configured", self.guild)
            }
            Err(err) => Err(err).context("failed to update guild registry"),
        }
    }
}

fn open_registry() -> Result<FileRegistry> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    FileRegistry::open_at(home).context("failed to open guild registry")
}
