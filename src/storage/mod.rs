//! Persistence layer.
//!
//! Stores raw upstream payloads as one JSON file per `WorkUnit`:
//! `<root>/league_<id>/season_<season>_<resource>.json`. The file body is
//! the payload verbatim. Writes go through a temp file in the same
//! directory and an atomic rename, so a crash never leaves a half-written
//! file at an entry path.

use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{CacheEntry, CacheError, Resource, WorkUnit};

/// Default cache directory.
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// File-backed cache of raw upstream responses.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    root: PathBuf,
}

impl ResponseCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location of a unit's entry.
    pub fn path_for(&self, unit: &WorkUnit) -> PathBuf {
        self.root
            .join(format!("league_{}", unit.league_id))
            .join(format!("season_{}_{}.json", unit.season, unit.resource.endpoint()))
    }

    /// Whether an entry exists. No side effects.
    pub fn has(&self, unit: &WorkUnit) -> bool {
        self.path_for(unit).is_file()
    }

    /// Load a unit's entry, failing with `CacheError::Miss` if absent.
    pub fn load(&self, unit: &WorkUnit) -> Result<CacheEntry, CacheError> {
        let path = self.path_for(unit);
        if !path.is_file() {
            return Err(CacheError::Miss(*unit));
        }

        let bytes = std::fs::read(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        let payload: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
                path: path.clone(),
                source,
            })?;

        let fetched_at = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        debug!(unit = %unit, path = %path.display(), "Cache entry loaded");
        Ok(CacheEntry { key: *unit, payload, fetched_at })
    }

    /// Write a unit's entry atomically.
    ///
    /// Overwrites an existing entry; the engine only calls this after a
    /// miss.
    pub fn save(&self, unit: &WorkUnit, payload: &serde_json::Value) -> Result<CacheEntry, CacheError> {
        let path = self.path_for(unit);
        let parent = path.parent().unwrap_or(&self.root).to_path_buf();
        let io_err = |source: std::io::Error| CacheError::Io { path: path.clone(), source };

        std::fs::create_dir_all(&parent).map_err(io_err)?;

        let json = serde_json::to_vec(payload)
            .map_err(|source| CacheError::Encode { unit: *unit, source })?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
        temp.write_all(&json).map_err(io_err)?;
        temp.flush().map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(&path).map_err(|e| io_err(e.error))?;

        if let Ok(dir) = std::fs::File::open(&parent) {
            let _ = dir.sync_all();
        }

        info!(unit = %unit, path = %path.display(), bytes = json.len(), "Cache entry saved");
        Ok(CacheEntry {
            key: *unit,
            payload: payload.clone(),
            fetched_at: Utc::now(),
        })
    }

    /// Delete a unit's entry so the next run fetches it again.
    /// Returns whether an entry was removed.
    pub fn invalidate(&self, unit: &WorkUnit) -> Result<bool, CacheError> {
        let path = self.path_for(unit);
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        info!(unit = %unit, path = %path.display(), "Cache entry invalidated");
        Ok(true)
    }

    /// Units of the given league and seasons that are already cached.
    pub fn cached_units(&self, league_id: u32, seasons: &[u16]) -> Vec<WorkUnit> {
        seasons
            .iter()
            .flat_map(|&season| {
                Resource::ALL
                    .iter()
                    .map(move |&resource| WorkUnit::new(resource, league_id, season))
            })
            .filter(|unit| self.has(unit))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
