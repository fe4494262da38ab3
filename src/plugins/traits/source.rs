use async_trait::async_trait;
use std::sync::Arc;

use crate::fetcher::{FetchedPage, PageFetcher};
use crate::models::{Offer, SearchCriteria, SourceKind};
use crate::plugins::sources::html::append_query_param;
use crate::utils::error::Result;

/// How a site advances through its result pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationScheme {
    /// 1-based page number.
    PageNumber,
    /// Row offset; the next offset is the number of offers collected so far.
    Offset,
}

/// The first page of a search together with the total it reports.
#[derive(Debug, Clone)]
pub struct CountedPage {
    pub total: u64,
    pub page: FetchedPage,
}

/// Trait for implementing listing-site scrapers (OLX, Sprzedajemy, etc.)
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn source_kind(&self) -> SourceKind;

    /// Pagination convention
    fn pagination(&self) -> PaginationScheme;
    fn cursor_param(&self) -> &str;

    /// Network access
    fn fetcher(&self) -> &Arc<dyn PageFetcher>;

    /// One search URL per keyword, with the price bounds in the site's query format.
    fn generate_urls(&self, criteria: &SearchCriteria) -> Vec<String>;

    /// Reads the "total results" indicator from a search page.
    fn parse_offers_count(&self, html: &str) -> Option<u64>;

    /// Extracts every well-formed listing on one page; malformed entries are skipped.
    fn parse_page(&self, html: &str) -> Vec<Offer>;

    fn initial_cursor(&self) -> u64 {
        match self.pagination() {
            PaginationScheme::PageNumber => 1,
            PaginationScheme::Offset => 0,
        }
    }

    fn next_cursor(&self, cursor: u64, accumulated: usize) -> u64 {
        match self.pagination() {
            PaginationScheme::PageNumber => cursor + 1,
            PaginationScheme::Offset => accumulated as u64,
        }
    }

    /// The initial cursor maps to the search URL itself.
    fn page_url(&self, search_url: &str, cursor: u64) -> String {
        if cursor == self.initial_cursor() {
            search_url.to_string()
        } else {
            append_query_param(search_url, self.cursor_param(), &cursor.to_string())
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        self.fetcher().fetch(url).await
    }

    /// Fetches `url` and reads its total offer count.
    ///
    /// `None` means the page could not be loaded or carried no count
    /// (zero matches or changed markup). Either way there is nothing to collect.
    async fn check_offers_count(&self, url: &str) -> Option<u64> {
        self.fetch_counted_page(url).await.map(|counted| counted.total)
    }

    /// Like [`check_offers_count`](Self::check_offers_count), but hands back the
    /// downloaded page so pagination can start from it.
    async fn fetch_counted_page(&self, url: &str) -> Option<CountedPage> {
        let page = match self.fetch_page(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("[{}] GET request failed: {}", self.name(), e);
                return None;
            }
        };

        match self.parse_offers_count(&page.body) {
            Some(total) => Some(CountedPage { total, page }),
            None => {
                tracing::info!("[{}] No offers found: {}", self.name(), url);
                None
            }
        }
    }
}
