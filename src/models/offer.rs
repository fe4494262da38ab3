use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use url::Url;

use crate::utils::error::AppError;

/// Listing sites the watcher knows how to scrape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Olx,
    Sprzedajemy,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Olx => "olx",
            SourceKind::Sprzedajemy => "sprzedajemy",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "olx" => Ok(SourceKind::Olx),
            "sprzedajemy" => Ok(SourceKind::Sprzedajemy),
            other => Err(AppError::Validation(format!("Unknown source: {}", other))),
        }
    }
}

/// Query parameters that identify a click, not a listing.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "reason", "search_reason", "ref", "bs"];

fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name)
}

/// Normalizes a listing link so the same listing always hashes the same way.
///
/// The fragment and tracking parameters are dropped and the remaining query
/// pairs are sorted. Links that do not parse as URLs are only trimmed.
pub fn canonicalize_link(link: &str) -> String {
    let trimmed = link.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }

    url.to_string()
}

/// Stable identity of a listing, namespaced by its source.
///
/// Either `"<source>:<native id>"` or `"<source>:h<hash>"` where the hash is
/// the first 8 bytes of SHA-256 over the canonical link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(String);

impl OfferId {
    pub fn native(source: SourceKind, id: u64) -> Self {
        OfferId(format!("{}:{}", source.as_str(), id))
    }

    pub fn from_link(source: SourceKind, link: &str) -> Self {
        let digest = Sha256::digest(canonicalize_link(link).as_bytes());
        let hash: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
        OfferId(format!("{}:h{}", source.as_str(), hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One listing scraped from a source.
///
/// Equality and hashing only look at `id`: a listing whose title or price
/// changed between scrapes is still the same offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    id: OfferId,
    source: SourceKind,
    title: String,
    price: u64,
    link: String,
    discovered_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(
        id: OfferId,
        source: SourceKind,
        title: impl Into<String>,
        price: u64,
        link: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source,
            title: title.into(),
            price,
            link: link.into(),
            discovered_at: Utc::now(),
        }
    }

    pub fn with_discovered_at(mut self, discovered_at: DateTime<Utc>) -> Self {
        self.discovered_at = discovered_at;
        self
    }

    pub fn id(&self) -> &OfferId {
        &self.id
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn discovered_at(&self) -> DateTime<Utc> {
        self.discovered_at
    }
}

impl PartialEq for Offer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Offer {}

impl Hash for Offer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} | {} | {}", self.source, self.title, self.price, self.link)
    }
}
