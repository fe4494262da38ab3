use super::*;
use offer_watcher::scheduler::RunScheduler;
use offer_watcher::OfferWatcher;
use tempfile::TempDir;

#[tokio::test]
async fn test_scheduler_basic_operations() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    mount_olx(&server, &[(1, "Audi Coupe GT", 8000)]).await;
    mount_sprzedajemy(&server, &[(2, "Audi Coupe 2.0", 6000)], &[]).await;
    mount_slack(&server, 2).await;

    let config = get_test_config(&server.uri(), &dir.path().join("offers.json"));
    let watcher = OfferWatcher::from_config(&config)?;
    let mut scheduler = RunScheduler::new(watcher, config.scheduler.clone()).await?;

    // Initial stats
    let initial_stats = scheduler.get_stats().await;
    assert_eq!(initial_stats.runs.completed_runs, 0);
    assert!(initial_stats.job_id.is_none());

    // Immediate run, as on startup
    let summary = scheduler.run_now().await.expect("run should not overlap");
    assert_eq!(summary.new_offers, 2);

    // A second immediate run finds nothing new
    let summary = scheduler.run_now().await.expect("run should not overlap");
    assert_eq!(summary.new_offers, 0);
    assert_eq!(summary.store_size, 2);

    scheduler.start().await?;
    let stats = scheduler.get_stats().await;
    assert!(stats.job_id.is_some());
    assert_eq!(stats.runs.completed_runs, 2);
    assert_eq!(stats.runs.skipped_runs, 0);
    assert_eq!(stats.cron_expression, "0 */15 * * * *");

    scheduler.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_scheduler_survives_unreachable_sites() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let dir = TempDir::new()?;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_slack(&server, 0).await;

    let config = get_test_config(&server.uri(), &dir.path().join("offers.json"));
    let scheduler = RunScheduler::new(OfferWatcher::from_config(&config)?, config.scheduler.clone()).await?;

    let summary = scheduler.run_now().await.expect("run should complete");
    assert_eq!(summary.offers_found, 0);
    assert_eq!(summary.new_offers, 0);

    let stats = scheduler.get_stats().await;
    assert_eq!(stats.runs.completed_runs, 1);
    assert_eq!(stats.runs.failed_runs, 0);

    Ok(())
}
