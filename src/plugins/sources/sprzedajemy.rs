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

pub const SPRZEDAJEMY_BASE_URL: &str = "https://sprzedajemy.pl";

const COUNT_CSS: &str = "p.other_offers em";
const LIST_CSS: &str = "ul.list.normal";
const ITEM_CSS: &str = r#"li[id^="offer-"]"#;
const LINK_CSS: &str = "a.offerLink";
const IMAGE_CSS: &str = "img[title]";
const PRICE_CSS: &str = "span.price";

struct SprzedajemySelectors {
    count: Selector,
    list: Selector,
    item: Selector,
    link: Selector,
    image: Selector,
    price: Selector,
}

/// Sprzedajemy search: everything in the query string, `offset=N` pagination.
pub struct SprzedajemyAdapter {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    selectors: SprzedajemySelectors,
}

impl SprzedajemyAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Result<Self> {
        Self::with_base_url(fetcher, SPRZEDAJEMY_BASE_URL)
    }

    pub fn with_base_url(fetcher: Arc<dyn PageFetcher>, base_url: &str) -> Result<Self> {
        Ok(Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            selectors: SprzedajemySelectors {
                count: selector(COUNT_CSS)?,
                list: selector(LIST_CSS)?,
                item: selector(ITEM_CSS)?,
                link: selector(LINK_CSS)?,
                image: selector(IMAGE_CSS)?,
                price: selector(PRICE_CSS)?,
            },
        })
    }

    fn offer_from_item(&self, item: ElementRef<'_>) -> Result<Offer> {
        let link_el = first_element(item, &self.selectors.link, LINK_CSS)?;
        let href = first_attr(link_el, "href").ok_or_else(|| AppError::ElementNotFound {
            selector: format!("{}[href]", LINK_CSS),
        })?;
        let link = absolutize(&self.base_url, href);

        // The listing title lives on the thumbnail; fall back to the link text.
        let title = link_el
            .select(&self.selectors.image)
            .next()
            .and_then(|img| first_attr(img, "title"))
            .map(str::to_string)
            .unwrap_or_else(|| element_text(link_el));
        if title.is_empty() {
            return Err(AppError::parse("empty offer title"));
        }

        let price_text = element_text(first_element(item, &self.selectors.price, PRICE_CSS)?);
        let price = first_number(&price_text)
            .ok_or_else(|| AppError::parse(format!("no price in '{}'", price_text)))?;

        let id = first_attr(item, "id")
            .and_then(|id| id.strip_prefix("offer-"))
            .and_then(|id| id.parse::<u64>().ok())
            .map(|id| OfferId::native(SourceKind::Sprzedajemy, id))
            .unwrap_or_else(|| OfferId::from_link(SourceKind::Sprzedajemy, &link));

        Ok(Offer::new(id, SourceKind::Sprzedajemy, title, price, link))
    }
}

#[async_trait]
impl SourceAdapter for SprzedajemyAdapter {
    fn name(&self) -> &str {
        "Sprzedajemy"
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::Sprzedajemy
    }

    fn pagination(&self) -> PaginationScheme {
        PaginationScheme::Offset
    }

    fn cursor_param(&self) -> &str {
        "offset"
    }

    fn fetcher(&self) -> &Arc<dyn PageFetcher> {
        &self.fetcher
    }

    fn generate_urls(&self, criteria: &SearchCriteria) -> Vec<String> {
        let mut conditions = String::new();
        if let Some(from) = criteria.conditions.price_from {
            conditions.push_str(&format!("&inp_price%5Bfrom%5D={}", from));
        }
        if let Some(to) = criteria.conditions.price_to {
            conditions.push_str(&format!("&inp_price%5Bto%5D={}", to));
        }

        criteria
            .keywords
            .iter()
            .map(|keyword| {
                format!(
                    "{}/wszystkie-ogloszenia?inp_text%5Bv%5D={}{}",
                    self.base_url,
                    form_encode(keyword),
                    conditions
                )
            })
            .collect()
    }

    fn parse_offers_count(&self, html: &str) -> Option<u64> {
        let document = Html::parse_document(html);
        let counter = document.select(&self.selectors.count).next()?;
        first_number(&element_text(counter))
    }

    fn parse_page(&self, html: &str) -> Vec<Offer> {
        let document = Html::parse_document(html);
        let Some(list) = document.select(&self.selectors.list).next() else {
            tracing::debug!("[Sprzedajemy] Offer list missing from page");
            return Vec::new();
        };

        list.select(&self.selectors.item)
            .filter_map(|item| match self.offer_from_item(item) {
                Ok(offer) => Some(offer),
                Err(e) => {
                    tracing::debug!("[Sprzedajemy] Skipping malformed offer: {}", e);
                    None
                }
            })
            .collect()
    }
}
