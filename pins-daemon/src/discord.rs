//! serenity adapters: model conversions, [`PinSource`] and [`CommandSurface`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serenity::all as discord;
use serenity::all::{Cache, Context, CreateWebhook, EditMessage, Permissions};
use tracing::debug;

use pins_core::{
    Attachment, Author, ChannelId, ChannelInfo, ChannelKind, GuildId, MessageId, SourceMessage,
    WebhookCredentials,
};
use pins_renderer::SenderIdentity;
use pins_sync::{parse_webhook_url, PinSource, ReplicateError};

use crate::commands::{CommandSurface, Invoker, WEBHOOK_CREATE_FAILED};
use crate::error::CommandError;

const MANAGER: Permissions = Permissions::MANAGE_WEBHOOKS.union(Permissions::MANAGE_MESSAGES);
const READER: Permissions = Permissions::VIEW_CHANNEL.union(Permissions::READ_MESSAGE_HISTORY);

// ---------------------------------------------------------------------------
// 1. Model conversions
// ---------------------------------------------------------------------------

pub fn channel_kind(kind: discord::ChannelType) -> ChannelKind {
    match kind {
        discord::ChannelType::Text => ChannelKind::Text,
        discord::ChannelType::News => ChannelKind::News,
        discord::ChannelType::Voice | discord::ChannelType::Stage => ChannelKind::Voice,
        discord::ChannelType::Category => ChannelKind::Category,
        discord::ChannelType::Forum => ChannelKind::Forum,
        _ => ChannelKind::Other,
    }
}

pub fn channel_info(channel: &discord::GuildChannel) -> ChannelInfo {
    ChannelInfo {
        id: ChannelId(channel.id.get()),
        guild_id: GuildId(channel.guild_id.get()),
        name: channel.name.clone(),
        kind: channel_kind(channel.kind),
        nsfw: channel.nsfw,
    }
}

/// Pinned messages fetched over REST carry no guild id, so it comes from `channel`.
pub fn source_message(
    message: &discord::Message,
    channel: &ChannelInfo,
    accent_color: Option<u32>,
) -> SourceMessage {
    SourceMessage {
        id: MessageId(message.id.get()),
        channel_id: ChannelId(message.channel_id.get()),
        channel_name: channel.name.clone(),
        guild_id: channel.guild_id,
        author: Author {
            name: message.author.name.clone(),
            avatar_url: message.author.face(),
            accent_color,
        },
        timestamp: timestamp(&message.timestamp),
        content: message.content.clone(),
        attachments: message
            .attachments
            .iter()
            .map(|a| Attachment {
                url: a.url.clone(),
                filename: a.filename.clone(),
                width: a.width,
            })
            .collect(),
    }
}

/// Full precision; Discord sends microseconds.
fn timestamp(ts: &discord::Timestamp) -> DateTime<Utc> {
    **ts
}

/// Accent colours already looked up, keyed by author.
///
/// Misses are remembered too, so webhook authors and members who left the
/// guild cost one lookup per fetch run.
#[derive(Debug, Clone, Default)]
struct AccentColors {
    known: Arc<DashMap<discord::UserId, Option<u32>>>,
}

impl AccentColors {
    async fn get_or_fetch<F, Fut>(&self, user: discord::UserId, fetch: F) -> Option<u32>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<u32>>,
    {
        if let Some(known) = self.known.get(&user).map(|c| *c) {
            return known;
        }
        let colour = fetch().await;
        self.known.insert(user, colour);
        colour
    }
}

/// Name and avatar the bot posts copies under.
pub fn sender_identity(cache: &Cache) -> SenderIdentity {
    let me = cache.current_user();
    SenderIdentity {
        name: me.name.clone(),
        avatar_url: me.avatar_url(),
    }
}

fn to_channel(id: ChannelId) -> Result<discord::ChannelId, CommandError> {
    std::num::NonZeroU64::new(id.get())
        .map(|n| discord::ChannelId::new(n.get()))
        .ok_or_else(|| CommandError::configuration("That isn't a valid channel."))
}

// ---------------------------------------------------------------------------
// 2. Pin source
// ---------------------------------------------------------------------------

/// Reads pinned messages over the REST API.
///
/// One instance serves one command or event, so author colours are looked up
/// at most once per migration.
#[derive(Clone)]
pub struct DiscordPins {
    ctx: Context,
    colors: AccentColors,
}

impl DiscordPins {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            colors: AccentColors::default(),
        }
    }

    /// The author's top role colour. Members missing from the cache are
    /// fetched over REST, since the gateway only delivers the bot's own member
    /// without the privileged members intent.
    async fn accent_color(&self, guild: discord::GuildId, user: discord::UserId) -> Option<u32> {
        self.colors
            .get_or_fetch(user, || async move {
                match guild.member(&self.ctx, user).await {
                    Ok(member) => member.colour(&self.ctx.cache).map(|c| c.0),
                    Err(err) => {
                        debug!(guild = %guild, user = %user, error = %err, "no member for pin author");
                        None
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl PinSource for DiscordPins {
    async fn pinned_messages(
        &self,
        channel: &ChannelInfo,
    ) -> Result<Vec<SourceMessage>, ReplicateError> {
        let id = to_channel(channel.id)
            .map_err(|e| ReplicateError::platform(format!("channel {}", channel.id), e))?;
        let pins = id
            .pins(&self.ctx.http)
            .await
            .map_err(|e| ReplicateError::platform(format!("fetch pins of #{}", channel.name), e))?;

        let guild = discord::GuildId::new(channel.guild_id.get());
        let mut messages = Vec::with_capacity(pins.len());
        for message in &pins {
            let accent = self.accent_color(guild, message.author.id).await;
            messages.push(source_message(message, channel, accent));
        }
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// 3. Command surface
// ---------------------------------------------------------------------------

/// The guild and channel a command message arrived in.
pub struct GuildSession {
    ctx: Context,
    guild_id: discord::GuildId,
    channel_id: discord::ChannelId,
    author: discord::User,
}

impl GuildSession {
    pub fn new(ctx: Context, guild_id: discord::GuildId, message: &discord::Message) -> Self {
        Self {
            ctx,
            guild_id,
            channel_id: message.channel_id,
            author: message.author.clone(),
        }
    }

    async fn member(&self, user: discord::UserId) -> Result<discord::Member, CommandError> {
        Ok(self.guild_id.member(&self.ctx, user).await?)
    }

    async fn guild_channel(
        &self,
        id: discord::ChannelId,
    ) -> Result<Option<discord::GuildChannel>, CommandError> {
        match id.to_channel(&self.ctx).await {
            Ok(channel) => Ok(channel.guild()),
            Err(discord::Error::Http(err)) if err.status_code().is_some_and(|s| s == 404) => {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn permissions_in(
        &self,
        channel: &discord::GuildChannel,
        user: discord::UserId,
    ) -> Result<Permissions, CommandError> {
        let member = self.member(user).await?;
        effective_permissions(&self.ctx.cache, self.guild_id, channel, &member)
    }
}

fn effective_permissions(
    cache: &Cache,
    guild: discord::GuildId,
    channel: &discord::GuildChannel,
    member: &discord::Member,
) -> Result<Permissions, CommandError> {
    cache
        .guild(guild)
        .map(|g| g.user_permissions_in(channel, member))
        .ok_or(CommandError::Permission)
}

fn readable_channels(
    cache: &Cache,
    guild: discord::GuildId,
    channels: &HashMap<discord::ChannelId, discord::GuildChannel>,
    bot: &discord::Member,
) -> Vec<ChannelInfo> {
    let Some(guild) = cache.guild(guild) else {
        return Vec::new();
    };
    let mut readable: Vec<ChannelInfo> = channels
        .values()
        .filter(|c| guild.user_permissions_in(c, bot).contains(READER))
        .map(channel_info)
        .collect();
    readable.sort_by_key(|c| c.id);
    readable
}

#[async_trait]
impl CommandSurface for GuildSession {
    fn guild_id(&self) -> GuildId {
        GuildId(self.guild_id.get())
    }

    fn invoker(&self) -> Invoker {
        Invoker {
            id: self.author.id.get(),
            name: self.author.name.clone(),
        }
    }

    async fn channels(&self) -> Result<Vec<ChannelInfo>, CommandError> {
        let channels = self.guild_id.channels(&self.ctx.http).await?;
        let me = self.ctx.cache.current_user().id;
        let bot = self.member(me).await?;
        Ok(readable_channels(&self.ctx.cache, self.guild_id, &channels, &bot))
    }

    async fn find_channel(&self, id: ChannelId) -> Result<Option<ChannelInfo>, CommandError> {
        let Ok(id) = to_channel(id) else {
            return Ok(None);
        };
        Ok(self.guild_channel(id).await?.as_ref().map(channel_info))
    }

    async fn invoker_is_manager(&self) -> Result<bool, CommandError> {
        let Some(channel) = self.guild_channel(self.channel_id).await? else {
            return Ok(false);
        };
        let perms = self.permissions_in(&channel, self.author.id).await?;
        Ok(perms.contains(MANAGER))
    }

    async fn bot_can_manage_webhooks(&self, channel: ChannelId) -> Result<bool, CommandError> {
        let Some(channel) = self.guild_channel(to_channel(channel)?).await? else {
            return Ok(false);
        };
        let bot = self.ctx.cache.current_user().id;
        let perms = self.permissions_in(&channel, bot).await?;
        Ok(perms.contains(Permissions::MANAGE_WEBHOOKS))
    }

    async fn create_webhook(
        &self,
        channel: ChannelId,
        name: &str,
        audit_reason: &str,
    ) -> Result<WebhookCredentials, CommandError> {
        let webhook = to_channel(channel)?
            .create_webhook(
                &self.ctx,
                CreateWebhook::new(name).audit_log_reason(audit_reason),
            )
            .await
            .map_err(|err| {
                tracing::error!(channel = %channel, error = %err, "failed to create webhook");
                CommandError::Endpoint(WEBHOOK_CREATE_FAILED.to_string())
            })?;

        let url = webhook.url()?;
        parse_webhook_url(&url).map_err(|err| CommandError::execution("webhook", err))
    }

    async fn say(&self, text: &str) -> Result<MessageId, CommandError> {
        let sent = self.channel_id.say(&self.ctx.http, text).await?;
        Ok(MessageId(sent.id.get()))
    }

    async fn edit(&self, message: MessageId, text: &str) -> Result<(), CommandError> {
        self.channel_id
            .edit_message(
                &self.ctx,
                discord::MessageId::new(message.get()),
                EditMessage::new().content(text),
            )
            .await?;
        Ok(())
    }
}
