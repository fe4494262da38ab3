use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LoggingConfig, MetricsConfig};
use crate::utils::error::{AppError, Result};

const LOG_FILE_PREFIX: &str = "offer-watcher.log";

/// Installs the global subscriber. `RUST_LOG` wins over `logging.level`.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// whole process.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AppError::Validation(format!("invalid log filter '{}': {}", config.level, e)))?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Internal(format!("failed to install tracing subscriber: {}", e)))?;

    Ok(guard)
}

/// Starts the Prometheus scrape endpoint when enabled.
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::Internal(format!("failed to install metrics exporter: {}", e)))?;

    describe_metrics();
    tracing::info!("Prometheus metrics listening on {}", addr);
    Ok(())
}

fn describe_metrics() {
    describe_counter!("offer_watcher_http_requests_total", "Search page requests sent");
    describe_counter!("offer_watcher_pages_fetched_total", "Result pages fetched during pagination");
    describe_counter!("offer_watcher_fetch_failures_total", "Result pages that failed to load");
    describe_counter!("offer_watcher_offers_discovered_total", "Offers kept after exclusion filtering");
    describe_counter!("offer_watcher_offers_excluded_total", "Offers dropped by excluded terms");
    describe_counter!("offer_watcher_new_offers_total", "Offers not seen in any previous run");
    describe_counter!("offer_watcher_notifications_sent_total", "Notifications delivered");
    describe_counter!("offer_watcher_notifications_failed_total", "Notifications that failed");
}
