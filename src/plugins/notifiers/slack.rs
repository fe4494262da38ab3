use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::SlackConfig;
use crate::models::Offer;
use crate::plugins::traits::{format_offer_line, NotificationSink};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

/// Posts one message per offer through Slack's `chat.postMessage`.
pub struct SlackNotifier {
    client: Client,
    config: SlackConfig,
    currency: String,
}

impl SlackNotifier {
    /// `timeout` bounds every API request.
    pub fn new(config: SlackConfig, currency: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(SlackNotifier {
            client,
            config,
            currency: currency.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat.postMessage", self.config.api_base.trim_end_matches('/'))
    }

    fn create_payload(&self, offer: &Offer) -> serde_json::Value {
        json!({
            "channel": self.config.channel,
            "text": format_offer_line(offer, &self.currency),
            "unfurl_links": false,
        })
    }

    fn error(&self, message: impl Into<String>) -> AppError {
        AppError::Notification {
            sink: self.plugin_type().to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    fn name(&self) -> &str {
        "Slack Notifier"
    }

    fn plugin_type(&self) -> &str {
        "slack"
    }

    async fn notify(&self, offer: &Offer) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.token)
            .json(&self.create_payload(offer))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error(format!("HTTP {}", status)));
        }

        // Slack reports API failures with a 200 and `ok: false`.
        let body: SlackResponse = response.json().await?;
        if !body.ok {
            return Err(self.error(body.error.unwrap_or_else(|| "unknown error".to_string())));
        }

        Ok(())
    }
}
