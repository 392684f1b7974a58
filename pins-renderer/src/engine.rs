//! Message rendering: [`render`] and [`RenderedPost`].
//!
//! # Field mapping
//!
//! | Post field      | Source                                                    |
//! |-----------------|-----------------------------------------------------------|
//! | `author_name`   | author display name                                       |
//! | `author_link`   | `https://discord.com/channels/<guild>/<channel>/<message>`|
//! | `author_avatar` | author avatar URL                                         |
//! | `description`   | message text, cut to [`DESCRIPTION_LIMIT`] characters     |
//! | `timestamp`     | message timestamp, unchanged                              |
//! | `footer`        | `In #<channel>`                                           |
//! | `color`         | author accent colour, unless default                      |
//! | `image_url`     | first attachment that is a recognised image               |
//! | `content`       | every other attachment URL, one per line                  |

use chrono::{DateTime, Utc};

use pins_core::types::{Attachment, SourceMessage};

/// Maximum embed description length, in characters.
pub const DESCRIPTION_LIMIT: usize = 1000;

const ELLIPSIS: &str = "...";
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "gif", "webp"];

/// Everything needed to mirror one pin, independent of the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPost {
    pub content: String,
    pub author_name: String,
    pub author_link: String,
    pub author_avatar: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub footer: String,
    pub color: Option<u32>,
    pub image_url: Option<String>,
}

/// Render a pinned message into a post. Pure; never fails.
pub fn render(message: &SourceMessage) -> RenderedPost {
    let mut content = String::new();
    let mut image_url = None;

    for attachment in &message.attachments {
        if image_url.is_none() && is_embeddable_image(attachment) {
            image_url = Some(attachment.url.clone());
        } else {
            content.push_str(&attachment.url);
            content.push('\n');
        }
    }

    RenderedPost {
        content,
        author_name: message.author.name.clone(),
        author_link: message_link(message),
        author_avatar: message.author.avatar_url.clone(),
        description: truncate_description(&message.content),
        timestamp: message.timestamp,
        footer: format!("In #{}", message.channel_name),
        color: message.author.accent_color.filter(|c| *c != 0),
        image_url,
    }
}

/// Deep link back to the original message.
pub fn message_link(message: &SourceMessage) -> String {
    format!(
        "https://discord.com/channels/{}/{}/{}",
        message.guild_id, message.channel_id, message.id
    )
}

fn truncate_description(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_LIMIT {
        return text.to_string();
    }
    let keep = DESCRIPTION_LIMIT - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

fn is_embeddable_image(attachment: &Attachment) -> bool {
    // Everything after the last dot, so a bare ".png" still counts.
    let ext = attachment
        .filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    let known = ext.is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()));
    known && attachment.has_dimensions()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
