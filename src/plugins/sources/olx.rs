use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use crate::fetcher::PageFetcher;
use crate::models::{Offer, OfferId, SearchCriteria, SourceKind};
use crate::plugins::sources::html::{
    absolutize, element_text, first_attr, first_element, first_number, form_encode, selector,
};
use crate::plugins::traits::{PaginationScheme, SourceAdapter};
use crate::utils::error::{AppError, Result};

pub const OLX_BASE_URL: &str = "https://www.olx.pl";

const COUNT_CSS: &str = r#"div[data-cy="search_results_info_results_count"] h2"#;
const TABLE_CSS: &str = "#offers_table";
const ROW_CSS: &str = "tr.wrap";
const ID_CSS: &str = "table[data-id]";
const LINK_CSS: &str = "a.link";
const TITLE_CSS: &str = "strong";
const PRICE_CSS: &str = "p.price";

struct OlxSelectors {
    count: Selector,
    table: Selector,
    row: Selector,
    id: Selector,
    link: Selector,
    title: Selector,
    price: Selector,
}

/// OLX search: keyword in the path, price filters in the query, `page=N` pagination.
pub struct OlxAdapter {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    selectors: OlxSelectors,
}

impl OlxAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Self::with_base_url(fetcher, OLX_BASE_URL)
    }

    pub fn with_base_url(fetcher: Arc<dyn PageFetcher>, base_url: &str) -> Result<Self> {
        Ok(Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            selectors: OlxSelectors {
                count: selector(COUNT_CSS)?,
                table: selector(TABLE_CSS)?,
                row: selector(ROW_CSS)?,
                id: selector(ID_CSS)?,
                link: selector(LINK_CSS)?,
                title: selector(TITLE_CSS)?,
                price: selector(PRICE_CSS)?,
            },
        })
    }

    /// "audi 80 quattro" -> "audi-80-quattro", percent-encoded for a path segment.
    fn keyword_slug(keyword: &str) -> String {
        let dashed = keyword.split_whitespace().collect::<Vec<_>>().join("-");
        form_encode(&dashed)
    }

    fn offer_from_row(&self, row: ElementRef<'_>) -> Result<Offer> {
        let link_el = first_element(row, &self.selectors.link, LINK_CSS)?;
        let href = first_attr(link_el, "href").ok_or_else(|| AppError::ElementNotFound {
            selector: format!("{}[href]", LINK_CSS),
        })?;
        let link = absolutize(&self.base_url, href);

        let title = element_text(first_element(link_el, &self.selectors.title, TITLE_CSS)?);
        if title.is_empty() {
            return Err(AppError::parse("empty offer title"));
        }

        let price_text = element_text(first_element(row, &self.selectors.price, PRICE_CSS)?);
        let price = first_number(&price_text)
            .ok_or_else(|| AppError::parse(format!("no price in '{}'", price_text)))?;

        let native_id = row
            .select(&self.selectors.id)
            .next()
            .and_then(|table| first_attr(table, "data-id"))
            .and_then(|id| id.parse::<u64>().ok());
        let id = match native_id {
            Some(id) => OfferId::native(SourceKind::Olx, id),
            None => OfferId::from_link(SourceKind::Olx, &link),
        };

        Ok(Offer::new(id, SourceKind::Olx, title, price, link))
    }
}

#[async_trait]
impl SourceAdapter for OlxAdapter {
    fn name(&self) -> &str {
        "OLX"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Olx
    }

    fn pagination(&self) -> PaginationScheme {
        PaginationScheme::PageNumber
    }

    fn cursor_param(&self) -> &str {
        "page"
    }

    fn fetcher(&self) -> &Arc<dyn PageFetcher> {
        &self.fetcher
    }

    fn generate_urls(&self, criteria: &SearchCriteria) -> Vec<String> {
        let mut filters = Vec::new();
        if let Some(from) = criteria.conditions.price_from {
            filters.push(format!("search[filter_float_price%3Afrom]={}", from));
        }
        if let Some(to) = criteria.conditions.price_to {
            filters.push(format!("search[filter_float_price%3Ato]={}", to));
        }
        let query = if filters.is_empty() {
            String::new()
        } else {
            format!("?{}", filters.join("&"))
        };

        criteria
            .keywords
            .iter()
            .map(|keyword| format!("{}/oferty/q-{}/{}", self.base_url, Self::keyword_slug(keyword), query))
            .collect()
    }

    fn parse_offers_count(&self, html: &str) -> Option<u64> {
        let document = Html::parse_document(html);
        let heading = document.select(&self.selectors.count).next()?;
        first_number(&element_text(heading))
    }

    fn parse_page(&self, html: &str) -> Vec<Offer> {
        let document = Html::parse_document(html);
        let Some(table) = document.select(&self.selectors.table).next() else {
            tracing::debug!("[OLX] Offers table missing from page");
            return Vec::new();
        };

        table
            .select(&self.selectors.row)
            .filter_map(|row| match self.offer_from_row(row) {
                Ok(offer) => Some(offer),
                Err(e) => {
                    tracing::debug!("[OLX] Skipping malformed offer: {}", e);
                    None
                }
            })
            .collect()
    }
}
