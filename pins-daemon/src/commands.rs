//! Command handlers: enable, migrate, disable, configure, help.
//!
//! Handlers never touch serenity directly. Everything they need from the
//! guild the command was sent in goes through [`CommandSurface`], so the
//! whole flow runs against fakes in tests.

use std::sync::Arc;

use async_trait::async_trait;

use pins_core::{ChannelId, ChannelInfo, GuildId, GuildRegistry, MessageId, WebhookCredentials};
use pins_renderer::SenderIdentity;
use pins_sync::{parse_webhook_url, DeliveryEndpoint, PinSource, Replicator};

use crate::dispatch::{Command, Setting};
use crate::error::CommandError;

pub const WEBHOOK_NAME: &str = "GAiA Pins";

pub const CROSS_SERVER: &str =
    "Are you trying to migrate pins across servers?? That ain't gonna fly, kid.";
pub const ALREADY_ENABLED: &str = "Pinned message redirection is already enabled in this server!";
pub const NOT_ENABLED: &str = "Pinned message redirection isn't enabled in this server!";
pub const NEEDS_WEBHOOK: &str =
    "I can't setup pins without a Webhook URL or permission to manage webhooks! Sorry!";
pub const INVALID_WEBHOOK_URL: &str = "The Webhook URL you specified was invalid!";
pub const WEBHOOK_CREATE_FAILED: &str =
    "I couldn't create a webhook in that channel! Check my permissions and try again.";
pub const WEBHOOK_UNAVAILABLE: &str =
    "I can't reach this server's pins webhook. If it was deleted, disable and enable pins again.";
pub const DISABLED: &str = "Pinned message redirection has been disabled in this server!";
pub const PINS_COPIED: &str = "Pins copied!";

/// The member who sent a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    pub id: u64,
    pub name: String,
}

/// The guild a command was sent in, as seen by the bot.
#[async_trait]
pub trait CommandSurface: Send + Sync {
    fn guild_id(&self) -> GuildId;

    fn invoker(&self) -> Invoker;

    /// Channels of this guild the bot can read history in.
    async fn channels(&self) -> Result<Vec<ChannelInfo>, CommandError>;

    /// `id` if it names a channel of this guild.
    async fn find_channel(&self, id: ChannelId) -> Result<Option<ChannelInfo>, CommandError>;

    /// Whether the invoker holds Manage Webhooks and Manage Messages.
    async fn invoker_is_manager(&self) -> Result<bool, CommandError>;

    /// Whether the bot may create webhooks in `channel`.
    async fn bot_can_manage_webhooks(&self, channel: ChannelId) -> Result<bool, CommandError>;

    async fn create_webhook(
        &self,
        channel: ChannelId,
        name: &str,
        audit_reason: &str,
    ) -> Result<WebhookCredentials, CommandError>;

    /// Post to the channel the command came from.
    async fn say(&self, text: &str) -> Result<MessageId, CommandError>;

    async fn edit(&self, message: MessageId, text: &str) -> Result<(), CommandError>;
}

pub struct Commands {
    replicator: Arc<Replicator>,
    prefix: String,
}

impl Commands {
    pub fn new(replicator: Arc<Replicator>, prefix: impl Into<String>) -> Self {
        Self {
            replicator,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Run `command` and return the final reply.
    ///
    /// Intermediate progress (migrate) is posted through `surface` directly.
    pub async fn run(
        &self,
        surface: &dyn CommandSurface,
        pins: &dyn PinSource,
        sender: &SenderIdentity,
        command: Command,
    ) -> Result<String, CommandError> {
        if command.requires_manager() && !surface.invoker_is_manager().await? {
            return Err(CommandError::Permission);
        }

        match command {
            Command::Enable {
                channel,
                webhook_url,
            } => self.enable(surface, channel, webhook_url.as_deref()).await,
            Command::Migrate => self.migrate(surface, pins, sender).await,
            Command::Disable => self.disable(surface).await,
            Command::Configure(setting) => self.configure(surface, setting).await,
            Command::Help => Ok(self.help()),
        }
    }

    // -----------------------------------------------------------------------
    // enable
    // -----------------------------------------------------------------------

    pub async fn enable(
        &self,
        surface: &dyn CommandSurface,
        channel: ChannelId,
        webhook_url: Option<&str>,
    ) -> Result<String, CommandError> {
        let guild = surface.guild_id();
        let in_guild = surface
            .find_channel(channel)
            .await?
            .is_some_and(|c| c.guild_id == guild);
        if !in_guild {
            return Err(CommandError::configuration(CROSS_SERVER));
        }

        let _guard = self.replicator.lock(guild).await;
        let registry = self.replicator.registry();
        if registry.get(guild)?.is_some() {
            tracing::error!(guild = %guild, "unable to enable pins: already enabled");
            return Err(CommandError::configuration(ALREADY_ENABLED));
        }

        let (credentials, name) = match webhook_url {
            Some(url) => self.adopt_webhook(guild, url).await?,
            None => {
                if !surface.bot_can_manage_webhooks(channel).await? {
                    tracing::error!(guild = %guild, "unable to enable pins: cannot manage webhooks");
                    return Err(CommandError::configuration(NEEDS_WEBHOOK));
                }
                let invoker = surface.invoker();
                let reason = format!(
                    "Pinned Message redirection setup by @{} ({})",
                    invoker.name, invoker.id
                );
                let credentials = surface
                    .create_webhook(channel, WEBHOOK_NAME, &reason)
                    .await?;
                (credentials, Some(WEBHOOK_NAME.to_string()))
            }
        };

        registry.create(guild, channel, credentials.clone())?;
        self.replicator
            .directory()
            .register(DeliveryEndpoint::resolved(credentials, name));
        tracing::info!(guild = %guild, channel = %channel, "pins enabled");

        let p = &self.prefix;
        Ok(format!(
            "Pinned messages are now setup for this server!\n\
             To migrate pins, use `{p}migrate`, and to configure further, use `{p}configure`.\n\
             Disable at any time with `{p}disable`."
        ))
    }

    /// Validate a user-supplied webhook URL against Discord.
    async fn adopt_webhook(
        &self,
        guild: GuildId,
        url: &str,
    ) -> Result<(WebhookCredentials, Option<String>), CommandError> {
        let credentials = parse_webhook_url(url).map_err(|err| {
            tracing::error!(guild = %guild, error = %err, "rejected webhook URL");
            CommandError::Endpoint(INVALID_WEBHOOK_URL.to_string())
        })?;
        let info = self
            .replicator
            .transport()
            .fetch(&credentials)
            .await
            .map_err(|err| {
                tracing::error!(guild = %guild, error = %err, "failed to fetch webhook from URL");
                CommandError::Endpoint(INVALID_WEBHOOK_URL.to_string())
            })?;
        if info.guild_id.is_some_and(|g| g != guild) {
            return Err(CommandError::configuration(CROSS_SERVER));
        }
        Ok((credentials, info.name))
    }

    // -----------------------------------------------------------------------
    // migrate
    // -----------------------------------------------------------------------

    pub async fn migrate(
        &self,
        surface: &dyn CommandSurface,
        pins: &dyn PinSource,
        sender: &SenderIdentity,
    ) -> Result<String, CommandError> {
        let guild = surface.guild_id();
        let Some(config) = self.replicator.registry().get(guild)? else {
            tracing::error!(guild = %guild, "unable to migrate pins: not enabled");
            return Err(CommandError::configuration(NOT_ENABLED));
        };

        let candidates = surface.channels().await?;
        let eligible = candidates
            .iter()
            .filter(|c| c.guild_id == guild && c.is_eligible(config.include_nsfw))
            .count();
        let progress = surface
            .say(&format!(
                "Migrating messages for {eligible} channels, this may take a while!"
            ))
            .await?;

        let plan = self
            .replicator
            .plan_migration(guild, &candidates, pins)
            .await?;
        surface
            .edit(
                progress,
                &format!(
                    "Migrating {} messages from {} channels, this may take a while!",
                    plan.message_count(),
                    plan.channel_count()
                ),
            )
            .await?;

        let report = self.replicator.execute(plan, sender).await?;
        tracing::info!(guild = %guild, delivered = report.delivered, "migration finished");
        Ok(PINS_COPIED.to_string())
    }

    // -----------------------------------------------------------------------
    // disable / configure / help
    // -----------------------------------------------------------------------

    pub async fn disable(&self, surface: &dyn CommandSurface) -> Result<String, CommandError> {
        let guild = surface.guild_id();
        let _guard = self.replicator.lock(guild).await;

        let registry = self.replicator.registry();
        let Some(config) = registry.get(guild)? else {
            tracing::error!(guild = %guild, "unable to disable pins: not enabled");
            return Err(CommandError::configuration(NOT_ENABLED));
        };
        registry.remove(guild)?;
        self.replicator.directory().unregister(config.webhook_id);

        tracing::info!(guild = %guild, "pins disabled");
        Ok(DISABLED.to_string())
    }

    pub async fn configure(
        &self,
        surface: &dyn CommandSurface,
        setting: Option<Setting>,
    ) -> Result<String, CommandError> {
        let guild = surface.guild_id();
        let _guard = self.replicator.lock(guild).await;
        let registry = self.replicator.registry();

        if let Some(Setting::IncludeNsfw(include)) = setting {
            registry.set_include_nsfw(guild, include)?;
            tracing::info!(guild = %guild, include_nsfw = include, "settings changed");
            return Ok(if include {
                "Pins from NSFW channels will now be copied.".to_string()
            } else {
                "Pins from NSFW channels will no longer be copied.".to_string()
            });
        }

        let Some(config) = registry.get(guild)? else {
            return Err(CommandError::configuration(NOT_ENABLED));
        };

        let nsfw = if config.include_nsfw {
            "included"
        } else {
            "excluded"
        };
        Ok(format!(
            "Pins are copied to <#{}>.\n\
             NSFW channels are {nsfw}; change this with `{}configure nsfw <on|off>`.\n\
             {} messages have been copied so far.",
            config.pins_channel_id,
            self.prefix,
            config.pinned_messages.len()
        ))
    }

    pub fn help(&self) -> String {
        let p = &self.prefix;
        format!(
            "**GAiA Pins** copies pinned messages into one channel.\n\
             `{p}enable #channel [webhook url]` sets up pin redirection for this server.\n\
             `{p}migrate` copies every existing pin. This may take a while.\n\
             `{p}configure [nsfw on|off]` shows or changes settings.\n\
             `{p}disable` turns pin redirection off.\n\
             `{p}help` shows this message."
        )
    }
}
