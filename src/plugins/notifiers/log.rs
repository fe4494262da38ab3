use async_trait::async_trait;

use crate::models::Offer;
use crate::plugins::traits::{format_offer_line, NotificationSink};
use crate::utils::error::Result;

/// Writes new offers to the log; always succeeds.
pub struct LogNotifier {
    currency: String,
}

impl LogNotifier {
    pub fn new(currency: impl Into<String>) -> Self {
        LogNotifier {
            currency: currency.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for LogNotifier {
    fn name(&self) -> &str {
        "Log Notifier"
    }

    fn plugin_type(&self) -> &str {
        "log"
    }

    async fn notify(&self, offer: &Offer) -> Result<()> {
        tracing::info!(offer_id = %offer.id(), source = %offer.source(), "New offer: {}", format_offer_line(offer, &self.currency));
        Ok(())
    }
}
