//! Finished fixtures from a `/fixtures` payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{parse_items, response_items, ApiTeam};
use crate::types::{FixtureRecord, TransformError};

/// Status codes of fixtures that have a final result.
pub const FINISHED_STATUSES: [&str; 3] = ["FT", "AET", "PEN"];

pub fn is_finished(status_code: &str) -> bool {
    FINISHED_STATUSES.contains(&status_code)
}

/// Matchday number from labels like `"Regular Season - 12"`.
pub fn round_ordinal(label: &str) -> Option<u32> {
    label.rsplit('-').next()?.trim().parse().ok()
}

/// Chronological sort key: date, then round, then id.
pub(crate) fn chronological_key(f: &FixtureRecord) -> (DateTime<Utc>, u32, u64) {
    (f.date, round_ordinal(&f.round_label).unwrap_or(u32::MAX), f.fixture_id)
}

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiFixture {
    fixture: ApiFixtureInfo,
    #[serde(default)]
    league: ApiFixtureLeague,
    teams: ApiSides<ApiTeam>,
    goals: ApiSides<Option<u32>>,
}

#[derive(Debug, Deserialize)]
struct ApiFixtureInfo {
    id: u64,
    date: DateTime<Utc>,
    status: ApiStatus,
}

/// Status is usually `{"short": "FT", ...}` but older dumps carry a bare code.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiStatus {
    Object {
        #[serde(default)]
        short: String,
    },
    Code(String),
}

impl ApiStatus {
    fn code(&self) -> &str {
        match self {
            ApiStatus::Object { short } => short,
            ApiStatus::Code(code) => code,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiFixtureLeague {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    season: u16,
    #[serde(default)]
    round: String,
}

#[derive(Debug, Deserialize)]
struct ApiSides<T> {
    home: T,
    away: T,
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Finished fixtures with both scores present, in chronological order.
pub fn derive_fixtures(payload: &Value) -> Result<Vec<FixtureRecord>, TransformError> {
    let items = response_items(payload)?;

    let mut records: Vec<FixtureRecord> = parse_items::<ApiFixture>(items, "fixture")
        .into_iter()
        .filter(|f| is_finished(f.fixture.status.code()))
        .filter_map(|f| {
            let (home_goals, away_goals) = (f.goals.home?, f.goals.away?);
            Some(FixtureRecord {
                fixture_id: f.fixture.id,
                date: f.fixture.date,
                league_id: f.league.id,
                season: f.league.season,
                round_label: f.league.round,
                home_team_id: f.teams.home.id,
                home_team: f.teams.home.name,
                away_team_id: f.teams.away.id,
                away_team: f.teams.away.name,
                home_goals,
                away_goals,
                status_code: f.fixture.status.code().to_string(),
            })
        })
        .collect();

    records.sort_by_key(chronological_key);
    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
