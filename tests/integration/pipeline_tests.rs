use super::*;
use offer_watcher::{OfferStore, OfferWatcher, RunMode};
use std::time::Duration;
use tempfile::TempDir;

const OLX_LISTINGS: &[Listing<'static>] = &[(111, "Audi Coupe quattro", 12500), (222, "Audi Coupe B3", 4000)];
const SPRZEDAJEMY_FIRST: &[Listing<'static>] = &[(1001, "Audi Coupe 2.3", 9000), (1002, "Audi A4 coupe look", 7000)];
const SPRZEDAJEMY_SECOND: &[Listing<'static>] = &[(1003, "Audi Coupe TT wheels", 15000)];

async fn mount_sites(server: &MockServer) {
    mount_olx(server, OLX_LISTINGS).await;
    mount_sprzedajemy(server, SPRZEDAJEMY_FIRST, SPRZEDAJEMY_SECOND).await;
}

#[tokio::test]
async fn test_first_run_notifies_every_kept_offer() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    mount_sites(&server).await;
    // 1002 and 1003 carry excluded whole words
    mount_slack(&server, 3).await;

    let config = get_test_config(&server.uri(), &dir.path().join("offers.json"));
    let mut watcher = OfferWatcher::from_config(&config)?;

    let summary = watcher.run_once(RunMode::Commit).await?;

    assert_eq!(summary.urls_scraped, 2);
    assert_eq!(summary.failed_tasks, 0);
    assert_eq!(summary.offers_found, 3);
    assert_eq!(summary.new_offers, 3);
    assert_eq!(summary.notifications_delivered, 3);
    assert_eq!(summary.notifications_failed, 0);
    assert!(summary.committed);
    assert_eq!(summary.store_size, 3);

    // Delivered in (source, price, title) order
    let messages = slack_messages(&server).await;
    assert_eq!(messages.len(), 3);
    assert!(messages[0].starts_with("Audi Coupe B3 | 4000zł | "));
    assert!(messages[1].starts_with("Audi Coupe quattro | 12500zł | "));
    assert!(messages[2].starts_with("Audi Coupe 2.3 | 9000zł | "));

    Ok(())
}

#[tokio::test]
async fn test_second_run_only_reports_new_listing() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let store_path = dir.path().join("offers.json");
    let config = get_test_config(&server.uri(), &store_path);

    mount_sites(&server).await;
    mount_slack(&server, 3).await;
    OfferWatcher::from_config(&config)?.run_once(RunMode::Commit).await?;
    server.verify().await;

    // A new listing shows up on OLX; a fresh watcher picks the history up from disk.
    server.reset().await;
    mount_olx(&server, &[OLX_LISTINGS[0], OLX_LISTINGS[1], (333, "Audi Coupe S2", 21000)]).await;
    mount_sprzedajemy(&server, SPRZEDAJEMY_FIRST, SPRZEDAJEMY_SECOND).await;
    mount_slack(&server, 1).await;

    let summary = OfferWatcher::from_config(&config)?.run_once(RunMode::Commit).await?;

    assert_eq!(summary.offers_found, 4);
    assert_eq!(summary.new_offers, 1);
    assert_eq!(summary.store_size, 4);

    let messages = slack_messages(&server).await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Audi Coupe S2 | 21000zł | "));

    Ok(())
}

#[tokio::test]
async fn test_dry_run_neither_notifies_nor_saves() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let store_path = dir.path().join("offers.json");
    mount_sites(&server).await;
    mount_slack(&server, 0).await;

    let config = get_test_config(&server.uri(), &store_path);
    let mut watcher = OfferWatcher::from_config(&config)?;

    let first = watcher.run_once(RunMode::DryRun).await?;
    let second = watcher.run_once(RunMode::DryRun).await?;

    assert_eq!(first.new_offers, 3);
    assert_eq!(second.new_offers, 3);
    assert!(!first.committed);
    assert_eq!(watcher.store().len(), 0);
    assert!(!store_path.exists());

    Ok(())
}

#[tokio::test]
async fn test_failing_notifier_does_not_block_commit() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let store_path = dir.path().join("offers.json");
    mount_sites(&server).await;
    Mock::given(method("POST"))
        .and(path(SLACK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "error": "invalid_auth" })))
        .mount(&server)
        .await;

    let config = get_test_config(&server.uri(), &store_path);
    let summary = OfferWatcher::from_config(&config)?.run_once(RunMode::Commit).await?;

    assert_eq!(summary.notifications_delivered, 0);
    assert_eq!(summary.notifications_failed, 3);
    assert!(summary.committed);
    assert_eq!(OfferStore::load(&store_path).len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_stalled_notifier_does_not_block_commit() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    let store_path = dir.path().join("offers.json");
    mount_sites(&server).await;
    Mock::given(method("POST"))
        .and(path(SLACK_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true }))
                .set_delay(Duration::from_secs(120)),
        )
        .mount(&server)
        .await;

    let mut config = get_test_config(&server.uri(), &store_path);
    config.notifications.timeout = 1;

    let mut watcher = OfferWatcher::from_config(&config)?;
    let run = watcher.run_once(RunMode::Commit);
    let summary = tokio::time::timeout(Duration::from_secs(30), run)
        .await
        .expect("run should finish despite the stalled sink")?;

    assert_eq!(summary.notifications_delivered, 0);
    assert_eq!(summary.notifications_failed, 3);
    assert!(summary.committed);
    assert_eq!(OfferStore::load(&store_path).len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_redirect_to_empty_results_stops_pagination() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    mount_olx(&server, OLX_LISTINGS).await;

    // Sprzedajemy claims 5 results but bounces the second page back to its front page.
    Mock::given(method("GET"))
        .and(path(SPRZEDAJEMY_SEARCH_PATH))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", format!("{}/", server.uri()).as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SPRZEDAJEMY_SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sprzedajemy_page(5, SPRZEDAJEMY_FIRST), "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html><body>front page</body></html>", "text/html"))
        .mount(&server)
        .await;
    mount_slack(&server, 3).await;

    let config = get_test_config(&server.uri(), &dir.path().join("offers.json"));
    let summary = OfferWatcher::from_config(&config)?.run_once(RunMode::Commit).await?;

    // 1001 kept, 1002 excluded, plus both OLX offers
    assert_eq!(summary.offers_found, 3);
    assert_eq!(summary.new_offers, 3);

    Ok(())
}
