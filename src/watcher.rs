use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{AppConfig, CommitPolicy};
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::models::{Offer, SearchCriteria};
use crate::offer_fetcher::{build_fetcher, OfferFetcher};
use crate::plugins::traits::{format_offer_line, DispatchReport};
use crate::plugins::PluginManager;
use crate::store::OfferStore;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Notify and record new offers.
    Commit,
    /// Only log what would be new.
    DryRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub urls_scraped: usize,
    pub failed_tasks: usize,
    pub offers_found: usize,
    pub new_offers: usize,
    pub notifications_delivered: usize,
    pub notifications_failed: usize,
    pub committed: bool,
    pub store_size: usize,
}

/// One scrape, diff, notify and persist cycle.
pub struct OfferWatcher {
    criteria: Arc<SearchCriteria>,
    offer_fetcher: OfferFetcher,
    plugins: PluginManager,
    store: OfferStore,
    commit_policy: CommitPolicy,
    currency: String,
}

impl OfferWatcher {
    pub fn new(
        criteria: SearchCriteria,
        offer_fetcher: OfferFetcher,
        plugins: PluginManager,
        store: OfferStore,
        commit_policy: CommitPolicy,
    ) -> Self {
        Self {
            criteria: Arc::new(criteria),
            offer_fetcher,
            plugins,
            store,
            commit_policy,
            currency: "zł".to_string(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Wires the HTTP fetcher, adapters, sinks and store described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(config.scraper.clone())?);
        let plugins = PluginManager::from_config(config, fetcher)?;
        let offer_fetcher = build_fetcher(plugins.sources().to_vec(), &config.scraper)?;
        let store = OfferStore::load(&config.store.path);

        Ok(Self::new(
            config.search_criteria()?,
            offer_fetcher,
            plugins,
            store,
            config.store.commit_policy,
        )
        .with_currency(&config.notifications.currency))
    }

    pub fn store(&self) -> &OfferStore {
        &self.store
    }

    pub async fn run_once(&mut self, mode: RunMode) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id, ?mode);
        self.run_inner(run_id, mode).instrument(span).await
    }

    async fn run_inner(&mut self, run_id: Uuid, mode: RunMode) -> Result<RunSummary> {
        tracing::info!("Starting run over {} keywords", self.criteria.keywords.len());
        let report = self.offer_fetcher.fetch_all(self.criteria.clone()).await;

        let (fresh, dispatch, committed) = match (mode, self.commit_policy) {
            (RunMode::DryRun, _) => {
                let fresh = self.store.new_entries(&report.offers, false);
                for offer in sorted(&fresh) {
                    tracing::info!("Preview: {}", format_offer_line(offer, &self.currency));
                }
                (fresh, DispatchReport::default(), false)
            }
            (RunMode::Commit, CommitPolicy::AfterNotify) => {
                let fresh = self.store.new_entries(&report.offers, false);
                let dispatch = self.notify(&fresh).await;
                self.store.new_entries(&fresh, true);
                (fresh, dispatch, true)
            }
            (RunMode::Commit, CommitPolicy::OnDiff) => {
                let fresh = self.store.new_entries(&report.offers, true);
                let dispatch = self.notify(&fresh).await;
                (fresh, dispatch, true)
            }
        };

        if committed {
            self.store.save()?;
        }
        counter!("offer_watcher_new_offers_total").increment(fresh.len() as u64);

        let summary = RunSummary {
            run_id,
            mode,
            urls_scraped: report.urls_scraped(),
            failed_tasks: report.failed_tasks,
            offers_found: report.offers.len(),
            new_offers: fresh.len(),
            notifications_delivered: dispatch.delivered,
            notifications_failed: dispatch.failed,
            committed,
            store_size: self.store.len(),
        };
        tracing::info!(
            "Run finished: {} offers found, {} new, {} notifications delivered, {} failed, store size {}",
            summary.offers_found,
            summary.new_offers,
            summary.notifications_delivered,
            summary.notifications_failed,
            summary.store_size
        );
        Ok(summary)
    }

    async fn notify(&self, fresh: &std::collections::HashSet<Offer>) -> DispatchReport {
        if fresh.is_empty() {
            tracing::info!("No new offers");
            return DispatchReport::default();
        }
        let offers: Vec<Offer> = fresh.iter().cloned().collect();
        self.plugins.dispatch(&offers).await
    }
}

fn sorted(offers: &std::collections::HashSet<Offer>) -> Vec<&Offer> {
    let mut ordered: Vec<&Offer> = offers.iter().collect();
    ordered.sort_by(|a, b| a.id().cmp(b.id()));
    ordered
}
