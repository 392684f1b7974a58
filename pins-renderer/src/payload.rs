//! Wire body for Discord's "execute webhook" call.

use serde::{Deserialize, Serialize};

use crate::engine::RenderedPost;

/// Who a mirrored post appears to come from: the bot's current name and avatar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub name: String,
    pub avatar_url: Option<String>,
}

/// `POST /webhooks/{id}/{token}` JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub content: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub allowed_mentions: AllowedMentions,
    pub embeds: Vec<Embed>,
}

/// An empty `parse` list disables every mention kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub author: EmbedAuthor,
    pub description: String,
    pub timestamp: String,
    pub footer: EmbedFooter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: String,
    pub icon_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

impl WebhookPayload {
    pub fn new(post: &RenderedPost, sender: &SenderIdentity) -> Self {
        let embed = Embed {
            author: EmbedAuthor {
                name: post.author_name.clone(),
                url: post.author_link.clone(),
                icon_url: post.author_avatar.clone(),
            },
            description: post.description.clone(),
            timestamp: post.timestamp.to_rfc3339(),
            footer: EmbedFooter {
                text: post.footer.clone(),
            },
            color: post.color,
            image: post.image_url.clone().map(|url| EmbedImage { url }),
        };

        Self {
            content: post.content.clone(),
            username: sender.name.clone(),
            avatar_url: sender.avatar_url.clone(),
            allowed_mentions: AllowedMentions::default(),
            embeds: vec![embed],
        }
    }
}
