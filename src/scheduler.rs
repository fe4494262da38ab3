use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::{AppConfig, SchedulerConfig};
use crate::utils::error::{AppError, Result};
use crate::watcher::{OfferWatcher, RunMode, RunSummary};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub completed_runs: u64,
    pub failed_runs: u64,
    pub skipped_runs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_summary: Option<RunSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub cron_expression: String,
    pub job_id: Option<Uuid>,
    pub runs: RunStats,
    pub uptime_seconds: u64,
}

/// Runs the watcher on a cron schedule. A tick that finds the previous run
/// still in progress is skipped.
pub struct RunScheduler {
    scheduler: JobScheduler,
    watcher: Arc<Mutex<OfferWatcher>>,
    stats: Arc<RwLock<RunStats>>,
    config: SchedulerConfig,
    job_id: Option<Uuid>,
    start_time: DateTime<Utc>,
}

impl RunScheduler {
    pub async fn new(watcher: OfferWatcher, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            watcher: Arc::new(Mutex::new(watcher)),
            stats: Arc::new(RwLock::new(RunStats::default())),
            config,
            job_id: None,
            start_time: Utc::now(),
        })
    }

    /// Registers the cron job and starts ticking.
    pub async fn start(&mut self) -> Result<()> {
        if !AppConfig::is_valid_cron(&self.config.cron) {
            return Err(AppError::Scheduler(format!("invalid cron expression '{}'", self.config.cron)));
        }

        let watcher = Arc::clone(&self.watcher);
        let stats = Arc::clone(&self.stats);

        let job = Job::new_async(self.config.cron.as_str(), move |_uuid, _l| {
            let watcher = Arc::clone(&watcher);
            let stats = Arc::clone(&stats);

            Box::pin(async move {
                Self::execute_run(watcher, stats).await;
            })
        })?;

        self.job_id = Some(self.scheduler.add(job).await?);
        self.scheduler.start().await?;
        tracing::info!("Run scheduler started with cron '{}'", self.config.cron);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("Run scheduler shutdown");
        Ok(())
    }

    /// Runs immediately, outside the schedule. `None` when a run is already in progress.
    pub async fn run_now(&self) -> Option<RunSummary> {
        Self::execute_run(Arc::clone(&self.watcher), Arc::clone(&self.stats)).await
    }

    pub async fn get_stats(&self) -> SchedulerStats {
        let uptime = Utc::now().signed_duration_since(self.start_time);

        SchedulerStats {
            cron_expression: self.config.cron.clone(),
            job_id: self.job_id,
            runs: self.stats.read().await.clone(),
            uptime_seconds: uptime.num_seconds().max(0) as u64,
        }
    }

    pub async fn is_run_in_progress(&self) -> bool {
        self.watcher.try_lock().is_err()
    }

    async fn execute_run(watcher: Arc<Mutex<OfferWatcher>>, stats: Arc<RwLock<RunStats>>) -> Option<RunSummary> {
        let Ok(mut guard) = watcher.try_lock() else {
            tracing::warn!("Previous run still in progress, skipping this tick");
            stats.write().await.skipped_runs += 1;
            return None;
        };

        let result = guard.run_once(RunMode::Commit).await;

        let mut stats = stats.write().await;
        stats.last_run = Some(Utc::now());
        match result {
            Ok(summary) => {
                stats.completed_runs += 1;
                stats.last_error = None;
                stats.last_summary = Some(summary.clone());
                Some(summary)
            }
            Err(e) => {
                tracing::error!("Scheduled run failed: {}", e);
                stats.failed_runs += 1;
                stats.last_error = Some(e.to_string());
                None
            }
        }
    }
}
