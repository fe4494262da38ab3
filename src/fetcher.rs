use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use url::Url;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Upper bound for a single backoff pause between retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub requested_url: String,
    pub final_url: String, // After redirects
    pub status: u16,
    pub body: String,
    pub response_time_ms: u64,
}

impl FetchedPage {
    /// True when no redirect moved us away from the page we asked for.
    pub fn landed_on_requested(&self) -> bool {
        same_location(&self.requested_url, &self.final_url)
    }
}

/// Compares two URLs by host, path and query pairs (in any order).
pub fn same_location(requested: &str, landed: &str) -> bool {
    match (Url::parse(requested), Url::parse(landed)) {
        (Ok(a), Ok(b)) => {
            let mut a_pairs: Vec<_> = a.query_pairs().collect();
            let mut b_pairs: Vec<_> = b.query_pairs().collect();
            a_pairs.sort();
            b_pairs.sort();

            a.host_str() == b.host_str()
                && a.port_or_known_default() == b.port_or_known_default()
                && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
                && a_pairs == b_pairs
        }
        _ => requested == landed,
    }
}

/// Network boundary used by source adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

pub struct HttpFetcher {
    client: Client,
    config: ScraperConfig,
}

impl HttpFetcher {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage> {
        let start_time = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e.to_string()))?;

        let status = response.status();
        // Server-side trouble is worth another attempt; anything else is an answer.
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::fetch(url, format!("HTTP {}", status)));
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::fetch(url, e.to_string()))?;

        Ok(FetchedPage {
            requested_url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body,
            response_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_delay_ms.max(1))
            .max_delay(MAX_RETRY_DELAY)
            .map(jitter)
            .take(self.config.retry_attempts as usize);

        let page = Retry::start(strategy, || async {
            let result = self.fetch_once(url).await;
            if let Err(e) = &result {
                tracing::debug!("Fetch attempt failed: {}", e);
            }
            result
        })
        .await?;

        metrics::counter!("offer_watcher_http_requests_total").increment(1);
        tracing::trace!(
            "Fetched {} ({} in {}ms)",
            page.final_url,
            page.status,
            page.response_time_ms
        );
        Ok(page)
    }
}
