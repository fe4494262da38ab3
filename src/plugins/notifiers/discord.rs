use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::config::DiscordConfig;
use crate::models::{Offer, SourceKind};
use crate::plugins::traits::NotificationSink;
use crate::utils::error::{AppError, Result};

pub struct DiscordNotifier {
    client: Client,
    config: DiscordConfig,
    currency: String,
}

impl DiscordNotifier {
    /// `timeout` bounds every webhook request.
    pub fn new(config: DiscordConfig, currency: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(DiscordNotifier {
            client,
            config,
            currency: currency.into(),
        })
    }

    fn get_embed_color(&self, source: SourceKind) -> u32 {
        match source {
            SourceKind::Olx => 0x002f34,         // OLX teal
            SourceKind::Sprzedajemy => 0xff9900, // Sprzedajemy orange
        }
    }

    fn create_embed(&self, offer: &Offer) -> serde_json::Value {
        json!({
            "title": format!("🚗 {}", offer.title()),
            "url": offer.link(),
            "color": self.get_embed_color(offer.source()),
            "timestamp": offer.discovered_at().to_rfc3339(),
            "fields": [
                {
                    "name": "💰 Price",
                    "value": format!("{} {}", offer.price(), self.currency),
                    "inline": true
                },
                {
                    "name": "🏪 Source",
                    "value": offer.source().as_str(),
                    "inline": true
                }
            ],
            "footer": {
                "text": "Offer Watcher"
            }
        })
    }

    fn create_webhook_payload(&self, offer: &Offer) -> serde_json::Value {
        let mut payload = json!({
            "embeds": [self.create_embed(offer)]
        });

        // Add webhook customization
        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }

        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    async fn notify(&self, offer: &Offer) -> Result<()> {
        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&self.create_webhook_payload(offer))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Notification {
                sink: self.plugin_type().to_string(),
                message: format!("HTTP {}", status),
            });
        }

        Ok(())
    }
}
