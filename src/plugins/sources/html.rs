//! Markup helpers shared by the source adapters.

use scraper::{ElementRef, Selector};
use url::Url;

use crate::utils::error::{AppError, Result};

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::parse(format!("Invalid CSS selector '{}': {:?}", css, e)))
}

/// Text content of an element with whitespace runs collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn first_element<'a>(scope: ElementRef<'a>, sel: &Selector, css: &str) -> Result<ElementRef<'a>> {
    scope.select(sel).next().ok_or_else(|| AppError::ElementNotFound {
        selector: css.to_string(),
    })
}

pub fn first_attr<'a>(element: ElementRef<'a>, attr: &str) -> Option<&'a str> {
    element.value().attr(attr).map(str::trim).filter(|v| !v.is_empty())
}

/// First run of digits after all whitespace is removed ("12 500 zł" -> 12500).
pub fn first_number(text: &str) -> Option<u64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits: String = compact
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn absolutize(base: &str, href: &str) -> String {
    match Url::parse(base).and_then(|base| base.join(href.trim())) {
        Ok(url) => url.to_string(),
        Err(_) => href.trim().to_string(),
    }
}

/// Appends `name=value` to a URL that may or may not already carry a query.
pub fn append_query_param(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') {
        if url.ends_with('?') || url.ends_with('&') { "" } else { "&" }
    } else {
        "?"
    };
    format!("{}{}{}={}", url, separator, name, value)
}

/// Percent-encodes a query value the way HTML forms do (spaces become `+`).
pub fn form_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
