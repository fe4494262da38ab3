use metrics::counter;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::ScraperConfig;
use crate::models::{Offer, SearchCriteria, SourceKind};
use crate::pagination::{Paginator, StopReason};
use crate::plugins::traits::SourceAdapter;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct UrlScrapeResult {
    pub source: SourceKind,
    pub search_url: String,
    pub reported_total: Option<u64>,
    pub pages_fetched: usize,
    pub stop_reason: StopReason,
    pub kept: usize,
    pub excluded: usize,
    pub elapsed_ms: u64,
}

/// Everything one scrape pass produced, merged across sources and URLs.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub offers: HashSet<Offer>,
    pub url_results: Vec<UrlScrapeResult>,
    pub failed_tasks: usize,
}

impl RunReport {
    /// Unions `batch` into the collected offers. Duplicate ids keep the first record seen.
    pub fn absorb(&mut self, batch: HashSet<Offer>) {
        self.offers.extend(batch);
    }

    pub fn urls_scraped(&self) -> usize {
        self.url_results.len()
    }
}

impl UrlScrapeResult {
    fn timed_out(source: SourceKind, search_url: &str, elapsed: Duration) -> Self {
        let elapsed_ms = elapsed.as_millis() as u64;
        Self {
            source,
            search_url: search_url.to_string(),
            reported_total: None,
            pages_fetched: 0,
            stop_reason: StopReason::TimedOut { after_ms: elapsed_ms },
            kept: 0,
            excluded: 0,
            elapsed_ms,
        }
    }
}

struct UrlScrape {
    result: UrlScrapeResult,
    offers: HashSet<Offer>,
}

enum TaskOutcome {
    Scraped(UrlScrape),
    /// Offers gathered before the deadline are dropped with the task.
    TimedOut(UrlScrapeResult),
}

/// Scrapes every generated search URL of every adapter concurrently.
pub struct OfferFetcher {
    sources: Vec<Arc<dyn SourceAdapter>>,
    paginator: Paginator,
    max_concurrent_fetches: usize,
    task_timeout: Option<Duration>,
}

impl OfferFetcher {
    pub fn new(sources: Vec<Arc<dyn SourceAdapter>>, config: &ScraperConfig) -> Self {
        Self {
            sources,
            paginator: Paginator::from_config(config),
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
            task_timeout: config.task_timeout(),
        }
    }

    /// Runs count, paginate and filter for each (adapter, URL) pair and merges the results.
    ///
    /// A task that fails, panics or times out contributes no offers and counts as failed;
    /// its siblings are unaffected. Timed-out URLs still get a result entry.
    pub async fn fetch_all(&self, criteria: Arc<SearchCriteria>) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_fetches));
        let mut tasks = JoinSet::new();

        for adapter in &self.sources {
            for url in adapter.generate_urls(&criteria) {
                let adapter = adapter.clone();
                let criteria = criteria.clone();
                let paginator = self.paginator.clone();
                let semaphore = semaphore.clone();
                let task_timeout = self.task_timeout;

                tasks.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| AppError::Internal(format!("semaphore closed: {}", e)))?;

                    let started = Instant::now();
                    let scrape = scrape_url(adapter.as_ref(), &url, &criteria, &paginator);
                    let outcome = match task_timeout {
                        Some(limit) => match tokio::time::timeout(limit, scrape).await {
                            Ok(scrape) => TaskOutcome::Scraped(scrape),
                            Err(_) => TaskOutcome::TimedOut(UrlScrapeResult::timed_out(
                                adapter.source_kind(),
                                &url,
                                started.elapsed(),
                            )),
                        },
                        None => TaskOutcome::Scraped(scrape.await),
                    };
                    Ok::<_, AppError>(outcome)
                });
            }
        }

        let mut report = RunReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(TaskOutcome::Scraped(scrape))) => {
                    report.absorb(scrape.offers);
                    report.url_results.push(scrape.result);
                }
                Ok(Ok(TaskOutcome::TimedOut(result))) => {
                    report.failed_tasks += 1;
                    tracing::warn!(
                        "[{}] Scrape of {} timed out after {}ms",
                        result.source,
                        result.search_url,
                        result.elapsed_ms
                    );
                    report.url_results.push(result);
                }
                Ok(Err(e)) => {
                    report.failed_tasks += 1;
                    tracing::warn!("Scrape task failed: {}", e);
                }
                Err(e) => {
                    report.failed_tasks += 1;
                    tracing::error!("Scrape task aborted: {}", e);
                }
            }
        }

        report
            .url_results
            .sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.search_url.cmp(&b.search_url)));

        tracing::info!(
            "Scraped {} URLs: {} distinct offers, {} failed tasks",
            report.urls_scraped(),
            report.offers.len(),
            report.failed_tasks
        );
        report
    }
}

async fn scrape_url(
    adapter: &dyn SourceAdapter,
    url: &str,
    criteria: &SearchCriteria,
    paginator: &Paginator,
) -> UrlScrape {
    let start_time = Instant::now();
    let source = adapter.source_kind();

    let counted = adapter.fetch_counted_page(url).await;
    let reported_total = counted.as_ref().map(|c| c.total);
    let outcome = paginator.collect_from(adapter, url, counted).await;

    let (kept, excluded): (HashSet<Offer>, HashSet<Offer>) = outcome
        .offers
        .into_iter()
        .partition(|offer| !criteria.exclusion.is_excluded(offer));

    for offer in &excluded {
        tracing::debug!("[{}] Excluded '{}'", adapter.name(), offer.title());
    }
    counter!("offer_watcher_offers_discovered_total", "source" => source.as_str()).increment(kept.len() as u64);
    counter!("offer_watcher_offers_excluded_total", "source" => source.as_str()).increment(excluded.len() as u64);

    let result = UrlScrapeResult {
        source,
        search_url: url.to_string(),
        reported_total,
        pages_fetched: outcome.pages_fetched,
        stop_reason: outcome.stop_reason,
        kept: kept.len(),
        excluded: excluded.len(),
        elapsed_ms: start_time.elapsed().as_millis() as u64,
    };
    tracing::info!(
        "[{}] {} -> total={:?} pages={} kept={} excluded={} ({:?})",
        adapter.name(),
        url,
        result.reported_total,
        result.pages_fetched,
        result.kept,
        result.excluded,
        result.stop_reason
    );

    UrlScrape { result, offers: kept }
}

/// Convenience for callers holding only `Result`-returning setup.
pub fn build_fetcher(sources: Vec<Arc<dyn SourceAdapter>>, config: &ScraperConfig) -> Result<OfferFetcher> {
    if sources.is_empty() {
        return Err(AppError::Validation("no enabled sources".to_string()));
    }
    Ok(OfferFetcher::new(sources, config))
}
