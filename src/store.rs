use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::{Offer, OfferId};
use crate::utils::error::{AppError, Result};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    saved_at: DateTime<Utc>,
    offers: Vec<Offer>,
}

/// Offers already seen, persisted as a JSON file. Append-only.
#[derive(Debug)]
pub struct OfferStore {
    path: PathBuf,
    known: HashMap<OfferId, Offer>,
}

impl OfferStore {
    /// Opens the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is logged
    /// and also treated as empty, so a damaged history never blocks a run.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let known = match Self::read_file(&path) {
            Ok(Some(file)) => {
                tracing::info!(
                    "Loaded {} known offers from {} (saved at {})",
                    file.offers.len(),
                    path.display(),
                    file.saved_at
                );
                file.offers.into_iter().map(|offer| (offer.id().clone(), offer)).collect()
            }
            Ok(None) => {
                tracing::info!("No offer history at {}, starting empty", path.display());
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable offer history {}: {}", path.display(), e);
                HashMap::new()
            }
        };

        Self { path, known }
    }

    fn read_file(path: &Path) -> Result<Option<StoreFile>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file: StoreFile = serde_json::from_str(&raw)?;
        if file.version != STORE_VERSION {
            return Err(AppError::Store(format!("unsupported store version {}", file.version)));
        }
        Ok(Some(file))
    }

    /// Returns the offers of `run` whose ids are not known yet.
    ///
    /// With `commit` the difference is recorded in memory. Without it the store
    /// is untouched and repeated calls give the same answer.
    pub fn new_entries(&mut self, run: &HashSet<Offer>, commit: bool) -> HashSet<Offer> {
        let fresh: HashSet<Offer> = run
            .iter()
            .filter(|offer| !self.known.contains_key(offer.id()))
            .cloned()
            .collect();

        if commit {
            for offer in &fresh {
                self.known.insert(offer.id().clone(), offer.clone());
            }
        }

        fresh
    }

    /// Writes the store atomically: temp file in the same directory, fsync, rename.
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut offers: Vec<Offer> = self.known.values().cloned().collect();
        offers.sort_by(|a, b| a.id().cmp(b.id()));

        let file = StoreFile {
            version: STORE_VERSION,
            saved_at: Utc::now(),
            offers,
        };

        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut temp, &file)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|e| AppError::Store(format!("failed to replace {}: {}", self.path.display(), e.error)))?;

        tracing::debug!("Saved {} offers to {}", self.known.len(), self.path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn contains(&self, id: &OfferId) -> bool {
        self.known.contains_key(id)
    }

    pub fn offers(&self) -> impl Iterator<Item = &Offer> {
        self.known.values()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
