use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::models::{ExclusionFilter, PriceConditions, SearchCriteria, SourceKind};
use crate::utils::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub search: SearchConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub keywords: Vec<String>,
    pub price_from: Option<u64>,
    pub price_to: Option<u64>,
    #[serde(default)]
    pub excluded_terms: Vec<String>,
    #[serde(default)]
    pub case_sensitive_exclusion: bool,
    #[serde(default)]
    pub whole_word_exclusion: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub max_concurrent_fetches: usize,
    pub max_pages: usize,
    pub page_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout: u64,
    pub task_timeout: Option<u64>,
    pub max_redirects: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Preview the difference, notify, then commit and save.
    AfterNotify,
    /// Commit while computing the difference, then notify and save.
    OnDiff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub commit_policy: CommitPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub currency: String,
    pub log: bool,
    /// Per-request timeout for webhook and API sinks, in seconds.
    pub timeout: u64,
    pub slack: Option<SlackConfig>,
    pub discord: Option<DiscordConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub token: String,
    #[serde(default = "default_slack_channel")]
    pub channel: String,
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Six-field cron expression (seconds first).
    pub cron: String,
    pub run_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            kind: SourceKind::Olx,
            enabled: true,
            base_url: None,
        },
        SourceConfig {
            kind: SourceKind::Sprzedajemy,
            enabled: true,
            base_url: None,
        },
    ]
}

fn default_slack_channel() -> String {
    "#general".to_string()
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            sources: default_sources(),
            scraper: ScraperConfig::default(),
            store: StoreConfig::default(),
            notifications: NotificationsConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            max_pages: 50,
            page_delay_ms: 250,
            retry_attempts: 2,
            retry_delay_ms: 500,
            request_timeout: 30,
            task_timeout: Some(300),
            max_redirects: 10,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) OfferWatcher/0.1".to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout.map(Duration::from_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/offers.json"),
            commit_policy: CommitPolicy::AfterNotify,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            currency: "zł".to_string(),
            log: true,
            timeout: 10,
            slack: None,
            discord: None,
        }
    }
}

impl NotificationsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: "0 */15 * * * *".to_string(),
            run_on_start: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "offer_watcher=info".to_string(),
            directory: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

impl AppConfig {
    /// Loads `config/default` (or `path` when given), then `config/local`,
    /// then `OFFER_WATCHER__*` environment variables.
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("config/default")),
        };

        let s = builder
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "OFFER_WATCHER__"
            .add_source(Environment::with_prefix("OFFER_WATCHER").prefix_separator("__").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        // Validate search configuration
        if self.search.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Message("Search keywords must not be empty".into()));
        }

        if let (Some(from), Some(to)) = (self.search.price_from, self.search.price_to) {
            if from > to {
                return Err(ConfigError::Message("Search price_from cannot exceed price_to".into()));
            }
        }

        // Validate sources
        if !self.sources.iter().any(|s| s.enabled) {
            return Err(ConfigError::Message("At least one source must be enabled".into()));
        }

        for source in &self.sources {
            if let Some(base_url) = &source.base_url {
                if Url::parse(base_url).is_err() {
                    return Err(ConfigError::Message(format!("Invalid base_url for source {}", source.kind)));
                }
            }
        }

        // Validate scraper configuration
        if self.scraper.max_concurrent_fetches == 0 {
            return Err(ConfigError::Message("Scraper max_concurrent_fetches must be greater than 0".into()));
        }

        if self.scraper.max_pages == 0 {
            return Err(ConfigError::Message("Scraper max_pages must be greater than 0".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        // Validate store configuration
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Message("Store path must not be empty".into()));
        }

        // Validate notifications
        if self.notifications.timeout == 0 {
            return Err(ConfigError::Message("Notifications timeout must be greater than 0".into()));
        }

        if let Some(slack) = &self.notifications.slack {
            if slack.token.trim().is_empty() {
                return Err(ConfigError::Message("Slack token must not be empty".into()));
            }
            if Url::parse(&slack.api_base).is_err() {
                return Err(ConfigError::Message("Invalid Slack api_base URL".into()));
            }
        }

        if let Some(discord) = &self.notifications.discord {
            if !discord.webhook_url.starts_with("https://discord.com/api/webhooks/") {
                return Err(ConfigError::Message("Invalid Discord webhook URL format".into()));
            }
        }

        // Validate scheduler configuration - basic cron validation
        if !Self::is_valid_cron(&self.scheduler.cron) {
            return Err(ConfigError::Message("Invalid cron expression in scheduler.cron".into()));
        }

        // Validate metrics configuration
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }

    pub fn is_valid_cron(cron_expr: &str) -> bool {
        // Basic cron validation - 6 parts (second minute hour day month weekday)
        let parts: Vec<&str> = cron_expr.split_whitespace().collect();
        if parts.len() != 6 {
            return false;
        }

        // Allow numbers, ranges, lists, wildcards, and steps
        parts.iter().all(|part| {
            part.chars()
                .all(|c| c.is_ascii_digit() || c == '*' || c == '-' || c == ',' || c == '/' || c == '?')
        })
    }

    pub fn search_criteria(&self) -> Result<SearchCriteria> {
        let exclusion = ExclusionFilter::new(
            &self.search.excluded_terms,
            self.search.case_sensitive_exclusion,
            self.search.whole_word_exclusion,
        )?;

        Ok(SearchCriteria::new(
            &self.search.keywords,
            PriceConditions::new(self.search.price_from, self.search.price_to),
            exclusion,
        ))
    }
}
