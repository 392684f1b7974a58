//! reqwest-backed [`WebhookTransport`].
//!
//! | Call    | Request                                            |
//! |---------|----------------------------------------------------|
//! | fetch   | `GET  {api}/webhooks/{id}/{token}`                 |
//! | execute | `POST {api}/webhooks/{id}/{token}?wait=true` + JSON |
//!
//! `429` responses are retried after the advertised `retry_after`, up to
//! `max_attempts` requests per call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use pins_core::types::{ChannelId, GuildId, MessageId, WebhookCredentials, WebhookId};
use pins_renderer::WebhookPayload;

use crate::error::DeliveryError;
use crate::transport::{WebhookInfo, WebhookTransport};

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/gaia-pins, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    api_base: String,
    max_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct RawWebhook {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawRateLimit {
    retry_after: f64,
}

impl HttpTransport {
    pub fn new() -> Result<Self, DeliveryError> {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Point the transport at another API root (used by tests).
    pub fn with_api_base(api_base: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    fn webhook_url(&self, credentials: &WebhookCredentials) -> String {
        format!(
            "{}/webhooks/{}/{}",
            self.api_base, credentials.id, credentials.token
        )
    }

    async fn send(
        &self,
        build: impl Fn() -> RequestBuilder + Send + Sync,
    ) -> Result<Response, DeliveryError> {
        let mut attempt = 1;
        loop {
            let response = build().send().await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return check_status(response).await;
            }

            let retry_after = retry_after(response).await;
            if attempt >= self.max_attempts {
                return Err(DeliveryError::RateLimited { retry_after });
            }
            tracing::warn!(
                attempt,
                retry_after_ms = retry_after.as_millis() as u64,
                "webhook rate limited, backing off"
            );
            tokio::time::sleep(retry_after).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn fetch(&self, credentials: &WebhookCredentials) -> Result<WebhookInfo, DeliveryError> {
        let url = self.webhook_url(credentials);
        let response = self.send(|| self.client.get(&url)).await?;
        let raw: RawWebhook = response.json().await?;

        Ok(WebhookInfo {
            id: parse_snowflake::<WebhookId>(&raw.id)?,
            name: raw.name,
            guild_id: raw
                .guild_id
                .as_deref()
                .map(parse_snowflake::<GuildId>)
                .transpose()?,
            channel_id: raw
                .channel_id
                .as_deref()
                .map(parse_snowflake::<ChannelId>)
                .transpose()?,
        })
    }

    async fn execute(
        &self,
        credentials: &WebhookCredentials,
        payload: &WebhookPayload,
    ) -> Result<MessageId, DeliveryError> {
        let url = self.webhook_url(credentials);
        let response = self
            .send(|| self.client.post(&url).query(&[("wait", "true")]).json(payload))
            .await?;
        let raw: RawMessage = response.json().await?;
        parse_snowflake(&raw.id)
    }
}

async fn check_status(response: Response) -> Result<Response, DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(DeliveryError::Unauthorized),
        StatusCode::NOT_FOUND => Err(DeliveryError::NotFound),
        _ => Err(DeliveryError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
    }
}

async fn retry_after(response: Response) -> Duration {
    let secs = response
        .json::<RawRateLimit>()
        .await
        .map(|r| r.retry_after)
        .unwrap_or(1.0);
    Duration::from_secs_f64(secs.clamp(0.0, 60.0))
}

fn parse_snowflake<T: std::str::FromStr>(raw: &str) -> Result<T, DeliveryError> {
    raw.parse()
        .map_err(|_| DeliveryError::Decode(format!("invalid snowflake '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use pins_renderer::{RenderedPost, SenderIdentity};

    fn creds() -> WebhookCredentials {
        WebhookCredentials::new(123, "tok")
    }

    fn payload() -> WebhookPayload {
        let post = RenderedPost {
            content: String::new(),
            author_name: "alice".into(),
            author_link: "https://discord.com/channels/1/2/3".into(),
            author_avatar: "https://cdn.example/a.png".into(),
            description: "hi".into(),
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            footer: "In #general".into(),
            color: None,
            image_url: None,
        };
        WebhookPayload::new(&post, &SenderIdentity::default())
    }

    #[tokio::test]
    async fn fetch_parses_webhook() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/webhooks/123/tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"123","name":"GAiA Pins","guild_id":"9","channel_id":"8","type":1}"#)
            .create_async()
            .await;

        let transport = HttpTransport::with_api_base(server.url()).unwrap();
        let info = transport.fetch(&creds()).await.expect("fetch");
        assert_eq!(info.id, WebhookId(123));
        assert_eq!(info.name.as_deref(), Some("GAiA Pins"));
        assert_eq!(info.guild_id, Some(GuildId(9)));
        assert_eq!(info.channel_id, Some(ChannelId(8)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn execute_posts_payload_and_waits() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhooks/123/tok")
            .match_query(Matcher::UrlEncoded("wait".into(), "true".into()))
            .match_body(Matcher::PartialJsonString(
                r#"{"allowed_mentions":{"parse":[]}}"#.into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"777"}"#)
            .create_async()
            .await;

        let transport = HttpTransport::with_api_base(server.url()).unwrap();
        let id = transport.execute(&creds(), &payload()).await.expect("execute");
        assert_eq!(id, MessageId(777));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_and_not_found_are_mapped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/webhooks/123/tok")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("GET", "/webhooks/404/tok")
            .with_status(404)
            .create_async()
            .await;

        let transport = HttpTransport::with_api_base(server.url()).unwrap();
        let err = transport.fetch(&creds()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Unauthorized), "got: {err}");
        assert!(err.is_endpoint_gone());

        let err = transport
            .fetch(&WebhookCredentials::new(404, "tok"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::NotFound), "got: {err}");
    }

    #[tokio::test]
    async fn rate_limit_is_retried_until_budget_spent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhooks/123/tok")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"You are being rate limited.","retry_after":0.0,"global":false}"#)
            .expect(3)
            .create_async()
            .await;

        let transport = HttpTransport::with_api_base(server.url()).unwrap();
        let err = transport.execute(&creds(), &payload()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::RateLimited { .. }), "got: {err}");
        assert!(!err.is_endpoint_gone());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/webhooks/123/tok")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let transport = HttpTransport::with_api_base(server.url())
            .unwrap()
            .max_attempts(1);
        let err = transport.execute(&creds(), &payload()).await.unwrap_err();
        match err {
            DeliveryError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
