//! Catalog-entry id sets persisted as JSON arrays
//!
//! Every mutation is flushed to disk before returning, so progress survives
//! an abrupt stop between two items.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Durable set of catalog-entry ids
#[derive(Debug)]
pub struct PersistedSet {
    path: PathBuf,
    ids: BTreeSet<u64>,
}

impl PersistedSet {
    /// Load from `path`, creating an empty file when none exists yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            let set = Self {
                path,
                ids: BTreeSet::new(),
            };
            set.flush()?;
            log::info!("Created empty id set at {}", set.path.display());
            return Ok(set);
        }

        let content = std::fs::read_to_string(&path)?;
        let ids: Vec<u64> = serde_json::from_str(&content).map_err(|source| Error::MalformedState {
            path: path.clone(),
            source,
        })?;

        log::debug!("Loaded {} ids from {}", ids.len(), path.display());
        Ok(Self {
            path,
            ids: ids.into_iter().collect(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Add `id` and flush. Returns whether it was new.
    pub fn add(&mut self, id: u64) -> Result<bool> {
        let inserted = self.ids.insert(id);
        if inserted {
            self.flush()?;
        }
        Ok(inserted)
    }

    /// Remove `id` and flush. Returns whether it was present.
    pub fn remove(&mut self, id: u64) -> Result<bool> {
        let removed = self.ids.remove(&id);
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ids.clear();
        self.flush()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let ids: Vec<u64> = self.ids.iter().copied().collect();
        std::fs::write(&self.path, serde_json::to_string(&ids)?)?;
        Ok(())
    }
}

/// The three dedup sets consulted when the queue is loaded
#[derive(Debug)]
pub struct DedupSets {
    pub seen: PersistedSet,
    pub blacklist: PersistedSet,
    pub not_resellable: PersistedSet,
}

impl DedupSets {
    /// Open `seen.json`, `blacklist.json` and `not_resable.json` under `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Self {
            seen: PersistedSet::open(dir.join("seen.json"))?,
            blacklist: PersistedSet::open(dir.join("blacklist.json"))?,
            not_resellable: PersistedSet::open(dir.join("not_resable.json"))?,
        })
    }

    /// Whether `id` is excluded from the queue
    pub fn excludes(&self, id: u64) -> bool {
        self.seen.contains(id) || self.blacklist.contains(id) || self.not_resellable.contains(id)
    }
}
