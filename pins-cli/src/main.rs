//! GAiA Pins: mirrors pinned Discord messages into one channel.
//!
//! # Usage
//!
//! ```text
//! gaia-pins run [--config <path>]
//! gaia-pins guilds [--json]
//! gaia-pins forget <guild-id>
//! gaia-pins config [--config <path>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigArgs,
    guilds::{ForgetArgs, GuildsArgs},
    run::RunArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "gaia-pins",
    version,
    about = "Copy pinned Discord messages into a single channel",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to Discord and serve commands and pin updates.
    Run(RunArgs),

    /// List guilds with pin redirection enabled.
    Guilds(GuildsArgs),

    /// Delete a guild's configuration and copy history.
    Forget(ForgetArgs),

    /// Print the effective configuration (token redacted).
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Guilds(args) => args.run(),
        Commands::Forget(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
