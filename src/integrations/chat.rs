//! Slack and Discord incoming-webhook notifiers.
//!
//! Both post a JSON message to a caller-supplied webhook URL. Success is
//! decided by the status code alone: 200 for Slack, 204 for Discord.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::traits::{require, IntegrationError, IntegrationResult, Notifier};

/// Display name used for messages posted by the hub
pub const BOT_USERNAME: &str = "Workflow Hub Bot";

const SLACK_ICON: &str = ":robot_face:";

#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
    username: &'a str,
    icon_emoji: &'a str,
}

#[derive(Debug, Serialize)]
struct DiscordPayload<'a> {
    content: &'a str,
    username: &'a str,
}

/// Post `payload` and accept only `expected` as success
async fn post_webhook<P: Serialize + ?Sized>(
    client: &Client,
    webhook_url: &str,
    payload: &P,
    expected: StatusCode,
    provider: &str,
) -> IntegrationResult<()> {
    let response = client.post(webhook_url).json(payload).send().await?;

    let status = response.status();
    debug!(provider, status = status.as_u16(), "Webhook notification posted");

    if status == expected {
        Ok(())
    } else {
        Err(IntegrationError::Rejected(format!(
            "Failed to send to {}",
            provider
        )))
    }
}

/// Slack incoming webhook
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(client: Client, webhook_url: impl Into<String>) -> IntegrationResult<Self> {
        let webhook_url = webhook_url.into();
        require(&webhook_url, "webhook_url")?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    async fn notify(&self, message: &str) -> IntegrationResult<()> {
        let payload = SlackPayload {
            text: message,
            username: BOT_USERNAME,
            icon_emoji: SLACK_ICON,
        };
        post_webhook(
            &self.client,
            &self.webhook_url,
            &payload,
            StatusCode::OK,
            "Slack",
        )
        .await
    }
}

/// Discord channel webhook
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(client: Client, webhook_url: impl Into<String>) -> IntegrationResult<Self> {
        let webhook_url = webhook_url.into();
        require(&webhook_url, "webhook_url")?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn notify(&self, message: &str) -> IntegrationResult<()> {
        let payload = DiscordPayload {
            content: message,
            username: BOT_USERNAME,
        };
        post_webhook(
            &self.client,
            &self.webhook_url,
            &payload,
            StatusCode::NO_CONTENT,
            "Discord",
        )
        .await
    }
}
