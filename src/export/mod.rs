//! CSV export of derived tables.
//!
//! One file per record type, every row tagged with its season so the
//! files can be filtered downstream. Files are rewritten in full from the
//! cache on every run.

use csv::Writer;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::storage::ResponseCache;
use crate::transform::{derive_fixtures, derive_standings_by_round_seeded, derive_standings_final, derive_teams};
use crate::types::{CacheError, FixtureRecord, Resource, StandingRow, TeamRecord, WorkUnit};

pub const RESULTS_FILE: &str = "results.csv";
pub const STANDINGS_BY_ROUND_FILE: &str = "standings_by_round.csv";
pub const STANDINGS_FINAL_FILE: &str = "standings_final.csv";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// CSV row for a standings line; adds the derived goal difference.
#[derive(Debug, Serialize)]
struct StandingCsvRow<'a> {
    season: u16,
    round: &'a str,
    rank: u32,
    team_id: u32,
    team_name: &'a str,
    played: u32,
    win: u32,
    draw: u32,
    lose: u32,
    goals_for: u32,
    goals_against: u32,
    goal_diff: i64,
    points: u32,
}

impl<'a> From<&'a StandingRow> for StandingCsvRow<'a> {
    fn from(r: &'a StandingRow) -> Self {
        Self {
            season: r.season,
            round: &r.round_label,
            rank: r.rank,
            team_id: r.team_id,
            team_name: &r.team_name,
            played: r.played,
            win: r.win,
            draw: r.draw,
            lose: r.lose,
            goals_for: r.goals_for,
            goals_against: r.goals_against,
            goal_diff: r.goal_diff(),
            points: r.points,
        }
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<usize, ExportError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = Writer::from_path(path)?;
    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = count, "CSV written");
    Ok(count)
}

pub fn write_fixtures(path: &Path, fixtures: &[FixtureRecord]) -> Result<usize, ExportError> {
    write_rows(path, fixtures)
}

pub fn write_standings(path: &Path, rows: &[StandingRow]) -> Result<usize, ExportError> {
    write_rows(path, rows.iter().map(StandingCsvRow::from))
}

/// Row counts of one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub results: usize,
    pub standings_by_round: usize,
    pub standings_final: usize,
}

/// Cached payload for `unit`, or `None` if it cannot be used.
fn cached_payload(cache: &ResponseCache, unit: &WorkUnit) -> Option<Value> {
    match cache.load(unit) {
        Ok(entry) => Some(entry.payload),
        Err(CacheError::Miss(_)) => {
            debug!(unit = %unit, "Not cached yet, leaving out of export");
            None
        }
        Err(e) => {
            warn!(unit = %unit, error = %e, "Unreadable cache entry, leaving out of export");
            None
        }
    }
}

/// Derive every table from whatever is cached and rewrite the CSVs in
/// `out_dir`. Units missing from the cache are left out; the files still
/// get written so downstream readers always find them.
pub fn export_all(
    cache: &ResponseCache,
    leagues: &[u32],
    seasons: &[u16],
    out_dir: &Path,
) -> Result<ExportSummary, ExportError> {
    let mut leagues = leagues.to_vec();
    leagues.sort_unstable();
    leagues.dedup();
    let mut seasons = seasons.to_vec();
    seasons.sort_unstable();
    seasons.dedup();

    let mut results = Vec::new();
    let mut by_round = Vec::new();
    let mut finals = Vec::new();

    for &league in &leagues {
        for &season in &seasons {
            let teams: Vec<TeamRecord> = match cached_payload(cache, &WorkUnit::new(Resource::Teams, league, season)) {
                Some(payload) => derive_teams(&payload).unwrap_or_else(|e| {
                    warn!(league, season, error = %e, "Bad teams payload");
                    Vec::new()
                }),
                None => Vec::new(),
            };

            if let Some(payload) = cached_payload(cache, &WorkUnit::new(Resource::Fixtures, league, season)) {
                match derive_fixtures(&payload) {
                    Ok(fixtures) => {
                        by_round.extend(derive_standings_by_round_seeded(&teams, &fixtures));
                        results.extend(fixtures);
                    }
                    Err(e) => warn!(league, season, error = %e, "Bad fixtures payload"),
                }
            }

            if let Some(payload) = cached_payload(cache, &WorkUnit::new(Resource::Standings, league, season)) {
                match derive_standings_final(&payload) {
                    Ok(rows) => finals.extend(rows),
                    Err(e) => warn!(league, season, error = %e, "Bad standings payload"),
                }
            }
        }
    }

    let summary = ExportSummary {
        results: write_fixtures(&out_dir.join(RESULTS_FILE), &results)?,
        standings_by_round: write_standings(&out_dir.join(STANDINGS_BY_ROUND_FILE), &by_round)?,
        standings_final: write_standings(&out_dir.join(STANDINGS_FINAL_FILE), &finals)?,
    };
    info!(
        results = summary.results,
        by_round = summary.standings_by_round,
        final_rows = summary.standings_final,
        "Export complete"
    );
    Ok(summary)
}
