// Integration tests for Offer Watcher
// These tests drive the real HTTP fetcher and adapters against local mock sites

pub mod pipeline_tests;
pub mod scheduler_tests;

use std::path::Path;

use offer_watcher::config::{ScraperConfig, SearchConfig, SlackConfig, SourceConfig};
use offer_watcher::{AppConfig, SourceKind};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const KEYWORD: &str = "audi coupe";
pub const OLX_SEARCH_PATH: &str = "/oferty/q-audi-coupe/";
pub const SPRZEDAJEMY_SEARCH_PATH: &str = "/wszystkie-ogloszenia";
pub const SLACK_PATH: &str = "/api/chat.postMessage";

/// Test configuration pointing every source and Slack at `server_uri`
pub fn get_test_config(server_uri: &str, store_path: &Path) -> AppConfig {
    let mut config = AppConfig::default();

    config.search = SearchConfig {
        keywords: vec![KEYWORD.to_string()],
        price_from: Some(1000),
        price_to: Some(30000),
        excluded_terms: vec!["a4".to_string(), "tt".to_string()],
        case_sensitive_exclusion: false,
        whole_word_exclusion: true,
    };
    config.sources = vec![
        SourceConfig {
            kind: SourceKind::Olx,
            enabled: true,
            base_url: Some(server_uri.to_string()),
        },
        SourceConfig {
            kind: SourceKind::Sprzedajemy,
            enabled: true,
            base_url: Some(server_uri.to_string()),
        },
    ];
    config.scraper = ScraperConfig {
        max_concurrent_fetches: 2,
        page_delay_ms: 0,
        retry_attempts: 0,
        retry_delay_ms: 10,
        request_timeout: 5,
        user_agent: "OfferWatcher-Test/1.0".to_string(),
        ..ScraperConfig::default()
    };
    config.store.path = store_path.to_path_buf();
    config.notifications.log = false;
    config.notifications.slack = Some(SlackConfig {
        token: "xoxb-test".to_string(),
        channel: "#offers".to_string(),
        api_base: format!("{}/api", server_uri),
    });

    config
}

/// (native id, title, price)
pub type Listing<'a> = (u64, &'a str, u64);

pub fn olx_page(total: u64, listings: &[Listing<'_>]) -> String {
    let rows: String = listings
        .iter()
        .map(|(id, title, price)| {
            format!(
                r#"<tr class="wrap"><td><table data-id="{id}"><tr><td>
                   <a class="link" href="/d/oferta/audi-ID{id}.html"><strong>{title}</strong></a>
                   <p class="price">{price} zł</p>
                   </td></tr></table></td></tr>"#
            )
        })
        .collect();

    format!(
        r#"<html><body>
           <div data-cy="search_results_info_results_count"><h2>Znaleźliśmy {total} ogłoszenia</h2></div>
           <table id="offers_table">{rows}</table>
           </body></html>"#
    )
}

pub fn sprzedajemy_page(total: u64, listings: &[Listing<'_>]) -> String {
    let items: String = listings
        .iter()
        .map(|(id, title, price)| {
            format!(
                r#"<li id="offer-{id}"><a class="offerLink" href="/audi-nr{id}"><img title="{title}"></a>
                   <span class="price">{price} zł</span></li>"#
            )
        })
        .collect();

    format!(
        r#"<html><body>
           <p class="other_offers">Znaleziono <em>{total}</em> ogłoszeń</p>
           <ul class="list normal">{items}</ul>
           </body></html>"#
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

/// OLX: one page of results for the test keyword
pub async fn mount_olx(server: &MockServer, listings: &[Listing<'_>]) {
    Mock::given(method("GET"))
        .and(path(OLX_SEARCH_PATH))
        .and(query_param("search[filter_float_price:from]", "1000"))
        .respond_with(html(olx_page(listings.len() as u64, listings)))
        .mount(server)
        .await;
}

/// Sprzedajemy: `first` on the search URL, `second` on `offset=<first.len()>`
pub async fn mount_sprzedajemy(server: &MockServer, first: &[Listing<'_>], second: &[Listing<'_>]) {
    let total = (first.len() + second.len()) as u64;

    // The offset mock must be mounted before the catch-all search mock.
    Mock::given(method("GET"))
        .and(path(SPRZEDAJEMY_SEARCH_PATH))
        .and(query_param("offset", first.len().to_string()))
        .respond_with(html(sprzedajemy_page(total, second)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(SPRZEDAJEMY_SEARCH_PATH))
        .and(query_param("inp_text[v]", KEYWORD))
        .respond_with(html(sprzedajemy_page(total, first)))
        .mount(server)
        .await;
}

/// Slack: accepts every message; `expected` posts are verified when the server drops
pub async fn mount_slack(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(SLACK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(expected)
        .mount(server)
        .await;
}

/// Texts of every message posted to Slack so far
pub async fn slack_messages(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == SLACK_PATH)
        .filter_map(|request| {
            let body: serde_json::Value = serde_json::from_slice(&request.body).ok()?;
            body["text"].as_str().map(str::to_string)
        })
        .collect()
}
