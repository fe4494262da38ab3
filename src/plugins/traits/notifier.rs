use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Offer;
use crate::utils::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Trait for implementing notification methods (Slack, Discord, etc.)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;

    /// Delivers one newly discovered offer.
    async fn notify(&self, offer: &Offer) -> Result<()>;
}

/// "<title> | <price><currency> | <link>"
pub fn format_offer_line(offer: &Offer, currency: &str) -> String {
    format!("{} | {}{} | {}", offer.title(), offer.price(), currency, offer.link())
}
