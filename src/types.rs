//! Shared types for the league collector.
//!
//! These types form the data model used across all modules: the unit of
//! work the planner schedules, the cached payload the fetcher produces,
//! the flat records the transformer derives, and the error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Resource / WorkUnit
// ---------------------------------------------------------------------------

/// An upstream endpoint the collector knows how to fetch.
///
/// Variant order is the fetch priority: teams first, then fixtures, then
/// standings, so a partial run leaves the most broadly useful data cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Teams,
    Fixtures,
    Standings,
}

impl Resource {
    /// All resources in priority order.
    pub const ALL: [Resource; 3] = [Resource::Teams, Resource::Fixtures, Resource::Standings];

    /// Endpoint path segment, also used in cache file names.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Resource::Teams => "teams",
            Resource::Fixtures => "fixtures",
            Resource::Standings => "standings",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "teams" | "team" => Ok(Resource::Teams),
            "fixtures" | "fixture" | "results" => Ok(Resource::Fixtures),
            "standings" | "standing" | "table" => Ok(Resource::Standings),
            other => Err(format!("Unknown resource: {other}")),
        }
    }
}

/// One required (resource, league, season) fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    pub resource: Resource,
    pub league_id: u32,
    pub season: u16,
}

impl WorkUnit {
    pub fn new(resource: Resource, league_id: u32, season: u16) -> Self {
        Self { resource, league_id, season }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[league={} season={}]", self.resource, self.league_id, self.season)
    }
}

// ---------------------------------------------------------------------------
// Cache entry
// ---------------------------------------------------------------------------

/// The last successfully fetched raw payload for a `WorkUnit`.
///
/// Written once on the first successful fetch and never rewritten by the
/// engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: WorkUnit,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// The upstream `response` array, or an empty slice if absent.
    pub fn response(&self) -> &[serde_json::Value] {
        self.payload
            .get("response")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Derived records
// ---------------------------------------------------------------------------

/// One finished fixture, flattened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureRecord {
    pub fixture_id: u64,
    pub date: DateTime<Utc>,
    pub league_id: u32,
    pub season: u16,
    pub round_label: String,
    pub home_team_id: u32,
    pub home_team: String,
    pub away_team_id: u32,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub status_code: String,
}

/// One team's line in a standings table, either reconstructed after a
/// round or taken from the upstream final table (`round_label == "final"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingRow {
    pub season: u16,
    pub round_label: String,
    pub rank: u32,
    pub team_id: u32,
    pub team_name: String,
    pub points: u32,
    pub played: u32,
    pub win: u32,
    pub draw: u32,
    pub lose: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl StandingRow {
    pub fn goal_diff(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }
}

/// A team participating in a league season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team_id: u32,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Budget decisions
// ---------------------------------------------------------------------------

/// Which budget window refused a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    DenyMinute,
    DenyDay,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::DenyMinute => write!(f, "per-minute budget exhausted"),
            DenyReason::DenyDay => write!(f, "per-day budget exhausted"),
        }
    }
}

/// A refused reservation and how long until the window frees a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denial {
    pub reason: DenyReason,
    pub retry_after: Duration,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (retry after {}s)", self.reason, self.retry_after.as_secs())
    }
}

/// Outcome of `RateBudget::reserve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Allow,
    Deny(Denial),
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    InvalidKey,
    RateLimited,
    AccountExpired,
    Other,
}

impl UpstreamErrorKind {
    /// Authentication-class errors: every further call would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UpstreamErrorKind::InvalidKey | UpstreamErrorKind::AccountExpired)
    }
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamErrorKind::InvalidKey => write!(f, "invalid key"),
            UpstreamErrorKind::RateLimited => write!(f, "rate limited"),
            UpstreamErrorKind::AccountExpired => write!(f, "account expired"),
            UpstreamErrorKind::Other => write!(f, "other"),
        }
    }
}

/// An error reported by the upstream API or the transport in front of it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Upstream error ({kind}): {message}")]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Errors raised by the on-disk response cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache miss: {0}")]
    Miss(WorkUnit),

    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode payload for {unit}: {source}")]
    Encode {
        unit: WorkUnit,
        #[source]
        source: serde_json::Error,
    },
}

/// Why a single fetch did not produce a payload.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Budget denied: {0}")]
    Denied(Denial),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// A cached payload whose top-level shape cannot be derived from.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Payload has no `response` array")]
    MissingResponse,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
