//! `gaia-pins config`: show the effective configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pins_daemon::{config_path_at, PinsConfig};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config file to use instead of ~/.gaia-pins/config.yaml.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let source = self.config.clone().unwrap_or_else(|| config_path_at(&home));
        let config = PinsConfig::load_at(&home, self.config.as_deref())
            .context("failed to load configuration")?;

        let origin = if source.exists() {
            source.display().to_string()
        } else {
            format!("{} (not found, using defaults)", source.display())
        };
        println!("# {origin}");
        print!(
            "{}",
            serde_yaml::to_string(&config.redacted()).context("failed to render configuration")?
        );
        Ok(())
    }
}
