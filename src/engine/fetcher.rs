//! Fetcher: one logical fetch of a `WorkUnit`, cache first.
//!
//! Cache hits cost nothing: no budget reservation, no network call, no
//! pause. A miss reserves one budget slot, calls the upstream once,
//! validates the body, and only then writes the cache entry.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::budget::RateBudget;
use super::clock::Clock;
use crate::storage::ResponseCache;
use crate::upstream::{self, FootballApi};
use crate::types::{CacheEntry, FetchError, Reservation, WorkUnit};

/// Where a fetched payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Cache,
    Network,
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub entry: CacheEntry,
    pub source: FetchSource,
}

pub struct Fetcher {
    api: Box<dyn FootballApi>,
    cache: ResponseCache,
    budget: RateBudget,
    clock: Arc<dyn Clock>,
    network_calls: u64,
    cache_hits: u64,
}

impl Fetcher {
    pub fn new(
        api: Box<dyn FootballApi>,
        cache: ResponseCache,
        budget: RateBudget,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            cache,
            budget,
            clock,
            network_calls: 0,
            cache_hits: 0,
        }
    }

    pub async fn fetch(&mut self, unit: &WorkUnit) -> Result<FetchOutcome, FetchError> {
        if self.cache.has(unit) {
            let entry = self.cache.load(unit)?;
            self.cache_hits += 1;
            debug!(unit = %unit, "Cache hit");
            return Ok(FetchOutcome { entry, source: FetchSource::Cache });
        }

        if let Reservation::Deny(denial) = self.budget.reserve() {
            return Err(FetchError::Denied(denial));
        }

        self.network_calls += 1;
        let result = self.api.get(*unit).await;

        // Pace every network attempt, successful or not.
        self.clock.sleep(self.budget.pacing()).await;

        let payload = result?;
        if let Err(e) = upstream::check_payload(&payload) {
            warn!(unit = %unit, kind = %e.kind, error = %e.message, "Upstream returned an error body");
            return Err(e.into());
        }

        let entry = self.cache.save(unit, &payload)?;
        info!(unit = %unit, items = entry.response().len(), "Fetched from network");
        Ok(FetchOutcome { entry, source: FetchSource::Network })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn budget_mut(&mut self) -> &mut RateBudget {
        &mut self.budget
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Network calls attempted by this fetcher.
    pub fn network_calls(&self) -> u64 {
        self.network_calls
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
