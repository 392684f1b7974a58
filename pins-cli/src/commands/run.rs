//! `gaia-pins run`: start the bot in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pins_daemon::{start_blocking, PinsConfig};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config file to use instead of ~/.gaia-pins/config.yaml.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config = PinsConfig::load_at(&home, self.config.as_deref())
            .context("failed to load configuration")?;
        config.token().context("cannot start the bot")?;

        start_blocking(&home, config).context("bot exited with error")
    }
}
