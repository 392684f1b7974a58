//! End-to-end rendering: source message → post → webhook JSON.

use chrono::{TimeZone, Utc};
use pins_core::types::{Attachment, Author, ChannelId, GuildId, MessageId, SourceMessage};
use pins_renderer::{render, SenderIdentity, WebhookPayload};

fn pinned(content: &str, attachments: Vec<Attachment>) -> SourceMessage {
    SourceMessage {
        id: MessageId(900),
        channel_id: ChannelId(20),
        channel_name: "memes".into(),
        guild_id: GuildId(10),
        author: Author {
            name: "bob".into(),
            avatar_url: "https://cdn.example/bob.png".into(),
            accent_color: Some(0x00ff00),
        },
        timestamp: Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap(),
        content: content.into(),
        attachments,
    }
}

#[test]
fn mixed_attachments_produce_one_image_and_link_lines() {
    let msg = pinned(
        "look at these",
        vec![
            Attachment {
                url: "https://cdn.example/doc.pdf".into(),
                filename: "doc.pdf".into(),
                width: None,
            },
            Attachment {
                url: "https://cdn.example/photo.png".into(),
                filename: "photo.png".into(),
                width: Some(10),
            },
            Attachment {
                url: "https://cdn.example/photo2.jpg".into(),
                filename: "photo2.jpg".into(),
                width: Some(20),
            },
        ],
    );
    let sender = SenderIdentity {
        name: "GAiA".into(),
        avatar_url: None,
    };
    let payload = WebhookPayload::new(&render(&msg), &sender);
    let json = serde_json::to_value(&payload).expect("serialize");

    assert_eq!(
        json["content"],
        "https://cdn.example/doc.pdf\nhttps://cdn.example/photo2.jpg\n"
    );
    assert_eq!(json["embeds"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["embeds"][0]["image"]["url"], "https://cdn.example/photo.png");
    assert_eq!(json["embeds"][0]["color"], 0x00ff00);
    assert_eq!(json["embeds"][0]["footer"]["text"], "In #memes");
    assert_eq!(
        json["embeds"][0]["author"]["url"],
        "https://discord.com/channels/10/20/900"
    );
    assert_eq!(json["allowed_mentions"]["parse"].as_array().map(Vec::len), Some(0));
}

#[test]
fn fifteen_hundred_chars_render_to_exactly_one_thousand() {
    let body: String = ('a'..='z').cycle().take(1500).collect();
    let post = render(&pinned(&body, vec![]));
    assert_eq!(post.description.len(), 1000);
    assert_eq!(&post.description[..997], &body[..997]);
    assert_eq!(&post.description[997..], "...");
}
