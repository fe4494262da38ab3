use metrics::counter;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::models::Offer;
use crate::fetcher::FetchedPage;
use crate::plugins::traits::{CountedPage, SourceAdapter};

/// Why pagination of one search URL ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Reported total was zero or missing; nothing was fetched.
    NothingToCollect,
    FetchFailed { message: String },
    /// The site sent us somewhere other than the requested page.
    Redirected { final_url: String },
    /// A page added no offer we had not already seen.
    Exhausted,
    /// Collected at least as many offers as the site reported.
    Complete,
    PageLimit,
    /// The whole scrape of this URL ran past its time limit.
    TimedOut { after_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct PaginationOutcome {
    pub offers: HashSet<Offer>,
    pub pages_fetched: usize,
    pub stop_reason: StopReason,
}

/// Walks the result pages of one search URL.
#[derive(Debug, Clone)]
pub struct Paginator {
    max_pages: usize,
    page_delay: Duration,
}

impl Paginator {
    pub fn new(max_pages: usize, page_delay: Duration) -> Self {
        Self {
            max_pages: max_pages.max(1),
            page_delay,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(config.max_pages, config.page_delay())
    }

    /// Collects offers until the reported total is reached or a stop condition hits.
    ///
    /// Never fetches when `reported_total` is `None` or `Some(0)`, and never
    /// fetches more than `max_pages` pages.
    pub async fn collect(
        &self,
        adapter: &dyn SourceAdapter,
        search_url: &str,
        reported_total: Option<u64>,
    ) -> PaginationOutcome {
        self.walk(adapter, search_url, reported_total, None).await
    }

    /// Same as [`collect`](Self::collect), starting from the page the count was read from
    /// instead of downloading it again.
    pub async fn collect_from(
        &self,
        adapter: &dyn SourceAdapter,
        search_url: &str,
        counted: Option<CountedPage>,
    ) -> PaginationOutcome {
        match counted {
            Some(CountedPage { total, page }) => self.walk(adapter, search_url, Some(total), Some(page)).await,
            None => self.walk(adapter, search_url, None, None).await,
        }
    }

    async fn walk(
        &self,
        adapter: &dyn SourceAdapter,
        search_url: &str,
        reported_total: Option<u64>,
        mut first_page: Option<FetchedPage>,
    ) -> PaginationOutcome {
        let mut offers = HashSet::new();
        let mut pages_fetched = 0;

        let total = match reported_total {
            Some(total) if total > 0 => total,
            _ => {
                return PaginationOutcome {
                    offers,
                    pages_fetched,
                    stop_reason: StopReason::NothingToCollect,
                };
            }
        };

        let mut cursor = adapter.initial_cursor();
        let stop_reason = loop {
            if pages_fetched > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let url = adapter.page_url(search_url, cursor);
            let fetched = match first_page.take() {
                Some(page) => Ok(page),
                None => adapter.fetch_page(&url).await,
            };
            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    counter!("offer_watcher_fetch_failures_total", "source" => adapter.source_kind().as_str())
                        .increment(1);
                    tracing::warn!("[{}] Page fetch failed {}: {}", adapter.name(), url, e);
                    break StopReason::FetchFailed { message: e.to_string() };
                }
            };
            pages_fetched += 1;
            counter!("offer_watcher_pages_fetched_total", "source" => adapter.source_kind().as_str()).increment(1);

            if !page.landed_on_requested() {
                tracing::info!("[{}] Redirected from {} to {}, stopping", adapter.name(), url, page.final_url);
                break StopReason::Redirected { final_url: page.final_url };
            }

            let before = offers.len();
            offers.extend(adapter.parse_page(&page.body));
            tracing::debug!(
                "[{}] Page {} of {} yielded {} new offers ({} / {})",
                adapter.name(),
                pages_fetched,
                search_url,
                offers.len() - before,
                offers.len(),
                total
            );

            if offers.len() == before {
                break StopReason::Exhausted;
            }
            if offers.len() as u64 >= total {
                break StopReason::Complete;
            }
            if pages_fetched >= self.max_pages {
                tracing::warn!(
                    "[{}] Page limit {} reached for {} with {} of {} offers",
                    adapter.name(),
                    self.max_pages,
                    search_url,
                    offers.len(),
                    total
                );
                break StopReason::PageLimit;
            }

            cursor = adapter.next_cursor(cursor, offers.len());
        };

        PaginationOutcome {
            offers,
            pages_fetched,
            stop_reason,
        }
    }
}
