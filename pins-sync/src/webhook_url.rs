//! Discord webhook URL parsing.
//!
//! Accepted shape: `https://<host>/api[/v<N>]/webhooks/<id>/<token>` where
//! `<host>` is one of [`DISCORD_HOSTS`].

use reqwest::Url;

use pins_core::types::{WebhookCredentials, WebhookId};

use crate::error::WebhookUrlError;

pub const DISCORD_HOSTS: &[&str] = &[
    "discord.com",
    "discordapp.com",
    "canary.discord.com",
    "ptb.discord.com",
];

/// Extract the webhook id and token from a URL pasted by a user.
pub fn parse_webhook_url(raw: &str) -> Result<WebhookCredentials, WebhookUrlError> {
    let url = Url::parse(raw.trim()).map_err(|e| WebhookUrlError::Malformed(e.to_string()))?;

    if url.scheme() != "https" {
        return Err(WebhookUrlError::InsecureScheme);
    }
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if !DISCORD_HOSTS.contains(&host.as_str()) {
        return Err(WebhookUrlError::UnknownHost(host));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let rest = match segments.as_slice() {
        ["api", version, rest @ ..] if is_api_version(version) => rest,
        ["api", rest @ ..] => rest,
        _ => return Err(WebhookUrlError::BadPath),
    };

    match rest {
        ["webhooks", id, token] => {
            let id: WebhookId = id.parse().map_err(|_| WebhookUrlError::BadPath)?;
            Ok(WebhookCredentials::new(id, *token))
        }
        _ => Err(WebhookUrlError::BadPath),
    }
}

fn is_api_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}
