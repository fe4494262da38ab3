pub mod html;
pub mod olx;
pub mod sprzedajemy;

pub use olx::OlxAdapter;
pub use sprzedajemy::SprzedajemyAdapter;

use std::sync::Arc;

use crate::fetcher::PageFetcher;
use crate::models::SourceKind;
use crate::plugins::traits::SourceAdapter;
use crate::utils::error::Result;

/// Builds the adapter for `kind`, optionally pointed at a non-default host.
pub fn build_adapter(
    kind: SourceKind,
    fetcher: Arc<dyn PageFetcher>,
    base_url: Option<&str>,
) -> Result<Arc<dyn SourceAdapter>> {
    let adapter: Arc<dyn SourceAdapter> = match (kind, base_url) {
        (SourceKind::Olx, Some(base)) => Arc::new(OlxAdapter::with_base_url(fetcher, base)?),
        (SourceKind::Olx, None) => Arc::new(OlxAdapter::new(fetcher)?),
        (SourceKind::Sprzedajemy, Some(base)) => Arc::new(SprzedajemyAdapter::with_base_url(fetcher, base)?),
        (SourceKind::Sprzedajemy, None) => Arc::new(SprzedajemyAdapter::new(fetcher)?),
    };
    Ok(adapter)
}
