use std::path::{Path, PathBuf};
use std::sync::Arc;

use serenity::Client;

use pins_core::{FileRegistry, GuildRegistry};
use pins_sync::{HttpTransport, Replicator, WebhookDirectory};

use crate::config::{LogFormat, PinsConfig};
use crate::error::{io_err, DaemonError};
use crate::handler::PinsHandler;

/// Start the bot and block the current thread until it exits.
pub fn start_blocking(home: &Path, config: PinsConfig) -> Result<(), DaemonError> {
    init_tracing(&config);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config))
}

/// Resolve stored webhooks, connect to the gateway and serve events until
/// ctrl-c or a gateway failure.
pub async fn run(home: PathBuf, config: PinsConfig) -> Result<(), DaemonError> {
    let token = config.token()?.to_string();

    let registry = Arc::new(FileRegistry::open_at(&home)?);
    let transport = Arc::new(HttpTransport::with_api_base(&config.discord.api_base)?);
    let directory = Arc::new(WebhookDirectory::new());

    let configs = registry.list_all()?;
    tracing::info!(guilds = configs.len(), "loading guild webhooks");
    directory
        .bootstrap(configs, registry.as_ref(), transport.as_ref())
        .await;

    let replicator = Arc::new(Replicator::new(registry, directory, transport));
    let handler = PinsHandler::new(replicator, config.discord.prefixes.clone());

    let mut client = Client::builder(&token, PinsHandler::intents())
        .event_handler(handler)
        .await?;

    let signal_handle = {
        let shards = client.shard_manager.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("received ctrl-c, shutting down");
                    shards.shutdown_all().await;
                    Ok(())
                }
                Err(err) => Err(DaemonError::Runtime(format!(
                    "ctrl-c handler failed: {err}"
                ))),
            }
        })
    };

    let result = client.start_autosharded().await;
    if !signal_handle.is_finished() {
        signal_handle.abort();
    } else {
        handle_join("signal_handler", signal_handle.await)?;
    }
    result?;
    tracing::info!("gateway closed");
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!("{task} task join failure: {err}"))),
    }
}

/// `RUST_LOG` wins over the configured filter.
pub fn init_tracing(config: &PinsConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = match config.log_format {
        LogFormat::Text => fmt().with_env_filter(filter).with_target(false).try_init(),
        LogFormat::Json => fmt().json().with_env_filter(filter).try_init(),
    };
}
