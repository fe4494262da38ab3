use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::Offer;
use crate::utils::error::{AppError, Result};

/// Price bounds applied by the sites' own search filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceConditions {
    pub price_from: Option<u64>,
    pub price_to: Option<u64>,
}

impl PriceConditions {
    pub fn new(price_from: Option<u64>, price_to: Option<u64>) -> Self {
        Self { price_from, price_to }
    }
}

/// Vetoes offers whose title contains an excluded term.
///
/// Matching is substring based unless `whole_words` is set, and case
/// insensitive unless `case_sensitive` is set.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    terms: Vec<String>,
    case_sensitive: bool,
    word_patterns: Option<Vec<Regex>>,
}

impl ExclusionFilter {
    pub fn new<I, S>(terms: I, case_sensitive: bool, whole_words: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique = BTreeSet::new();
        for term in terms {
            let term = term.as_ref().trim();
            if term.is_empty() {
                continue;
            }
            if case_sensitive {
                unique.insert(term.to_string());
            } else {
                unique.insert(term.to_lowercase());
            }
        }
        let terms: Vec<String> = unique.into_iter().collect();

        let word_patterns = if whole_words {
            let patterns = terms
                .iter()
                .map(|term| {
                    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
                        .case_insensitive(!case_sensitive)
                        .build()
                        .map_err(|e| AppError::Validation(format!("Invalid excluded term '{}': {}", term, e)))
                })
                .collect::<Result<Vec<_>>>()?;
            Some(patterns)
        } else {
            None
        };

        Ok(Self {
            terms,
            case_sensitive,
            word_patterns,
        })
    }

    /// A filter that excludes nothing.
    pub fn empty() -> Self {
        Self {
            terms: Vec::new(),
            case_sensitive: false,
            word_patterns: None,
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Returns the first term that disqualifies `title`.
    pub fn matching_term(&self, title: &str) -> Option<&str> {
        if let Some(patterns) = &self.word_patterns {
            return patterns
                .iter()
                .position(|pattern| pattern.is_match(title))
                .map(|idx| self.terms[idx].as_str());
        }

        if self.case_sensitive {
            self.terms.iter().find(|term| title.contains(term.as_str())).map(String::as_str)
        } else {
            let title = title.to_lowercase();
            self.terms.iter().find(|term| title.contains(term.as_str())).map(String::as_str)
        }
    }

    pub fn is_excluded(&self, offer: &Offer) -> bool {
        self.matching_term(offer.title()).is_some()
    }
}

/// Read-only search inputs shared by every source adapter for one run.
#[derive(Debug, Clone)]
pub struct SearchCriteria {
    pub keywords: BTreeSet<String>,
    pub conditions: PriceConditions,
    pub exclusion: ExclusionFilter,
}

impl SearchCriteria {
    pub fn new<I, S>(keywords: I, conditions: PriceConditions, exclusion: ExclusionFilter) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            keywords,
            conditions,
            exclusion,
        }
    }
}
