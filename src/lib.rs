pub mod config;
pub mod fetcher;
pub mod models;
pub mod offer_fetcher;
pub mod pagination;
pub mod plugins;
pub mod scheduler;
pub mod store;
pub mod utils;
pub mod watcher;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{Offer, OfferId, SearchCriteria, SourceKind};
pub use store::OfferStore;
pub use utils::error::{AppError, Result};
pub use watcher::{OfferWatcher, RunMode, RunSummary};
