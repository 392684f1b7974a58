//! Gateway event handler.

use std::sync::Arc;

use serenity::all::{
    async_trait, Channel, ChannelPinsUpdateEvent, Context, EventHandler, GatewayIntents, Message,
    Ready,
};
use tracing::{debug, error, info, warn};

use pins_core::GuildId;
use pins_sync::{IncrementalOutcome, PinSource, Replicator};

use crate::commands::Commands;
use crate::discord::{channel_info, sender_identity, DiscordPins, GuildSession};
use crate::dispatch;

pub struct PinsHandler {
    replicator: Arc<Replicator>,
    commands: Commands,
    prefixes: Vec<String>,
}

impl PinsHandler {
    pub fn new(replicator: Arc<Replicator>, prefixes: Vec<String>) -> Self {
        let primary = prefixes.first().cloned().unwrap_or_default();
        Self {
            commands: Commands::new(replicator.clone(), primary),
            replicator,
            prefixes,
        }
    }

    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
    }
}

#[async_trait]
impl EventHandler for PinsHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let Some(parsed) = dispatch::parse(&msg.content, &self.prefixes) else {
            return;
        };

        let session = GuildSession::new(ctx.clone(), guild_id, &msg);
        let pins = DiscordPins::new(ctx.clone());
        let sender = sender_identity(&ctx.cache);

        let (name, result) = match parsed {
            Ok(command) => {
                let name = command.name();
                (name, self.commands.run(&session, &pins, &sender, command).await)
            }
            Err(err) => ("usage", Err(err)),
        };

        let reply = match result {
            Ok(reply) => {
                info!(
                    command = name,
                    guild = %guild_id,
                    user = %msg.author.name,
                    "command executed"
                );
                reply
            }
            Err(err) => {
                error!(
                    command = name,
                    guild = %guild_id,
                    user = %msg.author.name,
                    error = %err,
                    source = ?std::error::Error::source(&err),
                    "command failed"
                );
                err.reply()
            }
        };

        if let Err(err) = msg.channel_id.say(&ctx.http, reply).await {
            warn!(error = %err, "failed to send command response");
        }
    }

    async fn channel_pins_update(&self, ctx: Context, pin: ChannelPinsUpdateEvent) {
        let Some(guild_id) = pin.guild_id else {
            return;
        };
        let guild = GuildId(guild_id.get());

        // Skip the pins fetch for guilds that never enabled redirection.
        if matches!(self.replicator.registry().get(guild), Ok(None)) {
            debug!(guild = %guild, "ignoring pins update for unconfigured guild");
            return;
        }

        let channel = match pin.channel_id.to_channel(&ctx).await {
            Ok(Channel::Guild(channel)) => channel_info(&channel),
            Ok(_) => return,
            Err(err) => {
                warn!(guild = %guild, channel = %pin.channel_id, error = %err, "failed to resolve channel");
                return;
            }
        };

        let pins = DiscordPins::new(ctx.clone());
        let current = match pins.pinned_messages(&channel).await {
            Ok(current) => current,
            Err(err) => {
                error!(guild = %guild, channel = %channel.id, error = %err, "failed to fetch pins");
                return;
            }
        };

        let sender = sender_identity(&ctx.cache);
        match self
            .replicator
            .on_pins_changed(guild, &channel, current, &sender)
            .await
        {
            Ok(IncrementalOutcome::Replicated(report)) => {
                debug!(guild = %guild, delivered = report.delivered, "pins update handled");
            }
            Ok(IncrementalOutcome::Ignored(_)) => {}
            Err(err) => {
                error!(guild = %guild, channel = %channel.id, error = %err, "pins update failed");
            }
        }
    }
}
