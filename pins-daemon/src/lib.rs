//! GAiA Pins bot runtime: configuration, command handling and the Discord
//! gateway adapter around the `pins-sync` replication engine.

pub mod commands;
pub mod config;
pub mod discord;
pub mod dispatch;
mod error;
mod handler;
mod runtime;

pub use commands::{CommandSurface, Commands, Invoker};
pub use config::{config_path_at, LogFormat, PinsConfig};
pub use dispatch::{Command, Setting};
pub use error::{CommandError, DaemonError};
pub use handler::PinsHandler;
pub use runtime::{init_tracing, run, start_blocking};
