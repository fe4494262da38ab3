use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;

use super::notifiers::{DiscordNotifier, LogNotifier, SlackNotifier};
use super::sources::build_adapter;
use super::traits::{DispatchReport, NotificationSink, SourceAdapter};
use crate::config::AppConfig;
use crate::fetcher::PageFetcher;
use crate::models::Offer;
use crate::utils::error::Result;

pub type SourceAdapterRef = Arc<dyn SourceAdapter>;
pub type NotificationSinkBox = Box<dyn NotificationSink>;

/// Owns the configured source adapters and notification sinks.
#[derive(Default)]
pub struct PluginManager {
    sources: Vec<SourceAdapterRef>,
    notifiers: Vec<NotificationSinkBox>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every enabled source and configured sink.
    pub fn from_config(config: &AppConfig, fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        let mut manager = Self::new();

        for source in config.sources.iter().filter(|s| s.enabled) {
            let adapter = build_adapter(source.kind, fetcher.clone(), source.base_url.as_deref())?;
            manager.register_source(adapter);
        }

        let notifications = &config.notifications;
        if notifications.log {
            manager.register_notifier(Box::new(LogNotifier::new(&notifications.currency)));
        }
        if let Some(slack) = &notifications.slack {
            let notifier = SlackNotifier::new(slack.clone(), &notifications.currency, notifications.timeout())?;
            manager.register_notifier(Box::new(notifier));
        }
        if let Some(discord) = &notifications.discord {
            let notifier = DiscordNotifier::new(discord.clone(), &notifications.currency, notifications.timeout())?;
            manager.register_notifier(Box::new(notifier));
        }

        tracing::info!(
            "Plugins ready: sources={:?} notifiers={:?}",
            manager.list_source_types(),
            manager.list_notifier_types()
        );
        Ok(manager)
    }

    /// Register a source adapter
    pub fn register_source(&mut self, adapter: SourceAdapterRef) {
        self.sources.push(adapter);
    }

    /// Register a notifier plugin
    pub fn register_notifier(&mut self, plugin: NotificationSinkBox) {
        self.notifiers.push(plugin);
    }

    pub fn sources(&self) -> &[SourceAdapterRef] {
        &self.sources
    }

    pub fn has_notifier(&self, plugin_type: &str) -> bool {
        self.notifiers.iter().any(|n| n.plugin_type() == plugin_type)
    }

    pub fn list_source_types(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.source_kind().to_string()).collect()
    }

    pub fn list_notifier_types(&self) -> Vec<String> {
        self.notifiers.iter().map(|n| n.plugin_type().to_string()).collect()
    }

    /// Sends every offer to every sink, ordered by (source, price, title).
    ///
    /// Sink failures are logged and counted, never propagated.
    pub async fn dispatch(&self, offers: &[Offer]) -> DispatchReport {
        let mut ordered: Vec<&Offer> = offers.iter().collect();
        ordered.sort_by(|a, b| {
            a.source()
                .cmp(&b.source())
                .then(a.price().cmp(&b.price()))
                .then_with(|| a.title().cmp(b.title()))
        });

        let mut report = DispatchReport::default();
        for offer in ordered {
            // Sinks are independent; offers still go out one at a time in order.
            let results = join_all(self.notifiers.iter().map(|notifier| notifier.notify(offer))).await;
            for (notifier, result) in self.notifiers.iter().zip(results) {
                match result {
                    Ok(()) => {
                        report.delivered += 1;
                        counter!("offer_watcher_notifications_sent_total", "sink" => notifier.plugin_type().to_string())
                            .increment(1);
                    }
                    Err(e) => {
                        report.failed += 1;
                        counter!("offer_watcher_notifications_failed_total", "sink" => notifier.plugin_type().to_string())
                            .increment(1);
                        tracing::warn!("{} failed for offer {}: {}", notifier.name(), offer.id(), e);
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscordConfig, SourceConfig};
    use crate::fetcher::MockPageFetcher;
    use crate::models::{OfferId, SourceKind};
    use crate::utils::error::AppError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingSink {
        kind: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            "Recording Sink"
        }

        fn plugin_type(&self) -> &str {
            self.kind
        }

        async fn notify(&self, offer: &Offer) -> Result<()> {
            if self.fail {
                return Err(AppError::Notification {
                    sink: self.kind.to_string(),
                    message: "unavailable".to_string(),
                });
            }
            self.seen.lock().unwrap().push(offer.title().to_string());
            Ok(())
        }
    }

    fn offer(source: SourceKind, id: u64, title: &str, price: u64) -> Offer {
        Offer::new(
            OfferId::native(source, id),
            source,
            title,
            price,
            format!("https://example.com/{}", id),
        )
    }

    #[tokio::test]
    async fn test_plugin_manager_creation() {
        let manager = PluginManager::new();
        assert!(manager.list_source_types().is_empty());
        assert!(manager.list_notifier_types().is_empty());
        assert_eq!(manager.dispatch(&[offer(SourceKind::Olx, 1, "a", 1)]).await, DispatchReport::default());
    }

    #[test]
    fn test_from_config_builds_enabled_plugins() {
        let mut config = AppConfig::default();
        config.sources = vec![
            SourceConfig {
                kind: SourceKind::Olx,
                enabled: true,
                base_url: None,
            },
            SourceConfig {
                kind: SourceKind::Sprzedajemy,
                enabled: false,
                base_url: None,
            },
        ];
        config.notifications.discord = Some(DiscordConfig {
            webhook_url: "https://discord.com/api/webhooks/1/t".to_string(),
            username: None,
            avatar_url: None,
        });

        let fetcher: Arc<dyn PageFetcher> = Arc::new(MockPageFetcher::new());
        let manager = PluginManager::from_config(&config, fetcher).unwrap();

        assert_eq!(manager.list_source_types(), vec!["olx".to_string()]);
        assert!(manager.has_notifier("log"));
        assert!(manager.has_notifier("discord"));
        assert!(!manager.has_notifier("slack"));
    }

    #[tokio::test]
    async fn test_dispatch_order_and_counts() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut manager = PluginManager::new();
        manager.register_notifier(Box::new(RecordingSink {
            kind: "recording",
            seen: seen.clone(),
            fail: false,
        }));
        manager.register_notifier(Box::new(RecordingSink {
            kind: "broken",
            seen: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }));

        let offers = vec![
            offer(SourceKind::Sprzedajemy, 1, "coupe", 5000),
            offer(SourceKind::Olx, 2, "b4 quattro", 9000),
            offer(SourceKind::Olx, 3, "80 quattro", 9000),
            offer(SourceKind::Olx, 4, "80 b3", 3000),
        ];

        let report = manager.dispatch(&offers).await;

        assert_eq!(report.delivered, 4);
        assert_eq!(report.failed, 4);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["80 b3", "80 quattro", "b4 quattro", "coupe"]
        );
    }
}
