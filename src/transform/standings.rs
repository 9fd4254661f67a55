//! Standings: the upstream final table, and per-round reconstruction.
//!
//! Reconstruction is a fold. `StandingsTable` is the running state,
//! `apply` is the step, and `RoundSnapshots` is a lazy iterator that
//! applies chronologically ordered fixtures until a round label is
//! complete and yields the ranked table. Recreating the iterator restarts
//! the fold.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use super::fixtures::{chronological_key, is_finished, round_ordinal};
use super::{parse_items, response_items, ApiTeam};
use crate::types::{FixtureRecord, StandingRow, TeamRecord, TransformError};

/// Label of rows taken from the upstream end-of-season table.
pub const FINAL_ROUND_LABEL: &str = "final";

// ---------------------------------------------------------------------------
// Running table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct TeamTally {
    name: String,
    played: u32,
    win: u32,
    draw: u32,
    lose: u32,
    goals_for: u32,
    goals_against: u32,
}

impl TeamTally {
    fn points(&self) -> u32 {
        3 * self.win + self.draw
    }

    fn goal_diff(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }

    fn record(&mut self, scored: u32, conceded: u32) {
        self.played += 1;
        self.goals_for += scored;
        self.goals_against += conceded;
        match scored.cmp(&conceded) {
            std::cmp::Ordering::Greater => self.win += 1,
            std::cmp::Ordering::Equal => self.draw += 1,
            std::cmp::Ordering::Less => self.lose += 1,
        }
    }
}

/// Per-team aggregates, keyed by team id.
#[derive(Debug, Clone, Default)]
pub struct StandingsTable {
    teams: BTreeMap<u32, TeamTally>,
}

impl StandingsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table listing `teams` with zero matches played.
    pub fn seeded(teams: &[TeamRecord]) -> Self {
        let mut table = Self::new();
        for t in teams {
            table.entry(t.team_id, &t.name);
        }
        table
    }

    fn entry(&mut self, team_id: u32, name: &str) -> &mut TeamTally {
        let tally = self.teams.entry(team_id).or_default();
        if tally.name.is_empty() {
            tally.name = name.to_string();
        }
        tally
    }

    /// Fold one result into the table. Unfinished fixtures are ignored.
    pub fn apply(&mut self, f: &FixtureRecord) {
        if !is_finished(&f.status_code) {
            return;
        }
        self.entry(f.home_team_id, &f.home_team).record(f.home_goals, f.away_goals);
        self.entry(f.away_team_id, &f.away_team).record(f.away_goals, f.home_goals);
    }

    /// Ranked rows: points, then goal difference, then goals for, all
    /// descending; remaining ties stay in team-id order.
    pub fn ranked(&self, season: u16, round_label: &str) -> Vec<StandingRow> {
        let mut order: Vec<(&u32, &TeamTally)> = self.teams.iter().collect();
        order.sort_by(|(_, a), (_, b)| {
            b.points()
                .cmp(&a.points())
                .then(b.goal_diff().cmp(&a.goal_diff()))
                .then(b.goals_for.cmp(&a.goals_for))
        });

        order
            .into_iter()
            .enumerate()
            .map(|(i, (&team_id, t))| StandingRow {
                season,
                round_label: round_label.to_string(),
                rank: i as u32 + 1,
                team_id,
                team_name: t.name.clone(),
                points: t.points(),
                played: t.played,
                win: t.win,
                draw: t.draw,
                lose: t.lose,
                goals_for: t.goals_for,
                goals_against: t.goals_against,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Round snapshots
// ---------------------------------------------------------------------------

/// The ranked table right after one round boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
    pub season: u16,
    pub round_label: String,
    pub rows: Vec<StandingRow>,
}

/// Lazy fold over one season's finished fixtures, one round per item.
///
/// Each round label yields exactly one snapshot: the table right after the
/// chronologically last fixture carrying that label. A postponed match
/// played between later rounds therefore delays its round's snapshot
/// instead of splitting it. Snapshots come out in completion order.
#[derive(Debug, Clone)]
pub struct RoundSnapshots<'a> {
    fixtures: Vec<&'a FixtureRecord>,
    /// `closes_round[i]`: no later fixture shares fixture `i`'s label.
    closes_round: Vec<bool>,
    pos: usize,
    table: StandingsTable,
}

impl Iterator for RoundSnapshots<'_> {
    type Item = RoundSnapshot;

    fn next(&mut self) -> Option<RoundSnapshot> {
        while let Some(&f) = self.fixtures.get(self.pos) {
            self.table.apply(f);
            let closes = self.closes_round[self.pos];
            self.pos += 1;
            if closes {
                return Some(RoundSnapshot {
                    season: f.season,
                    round_label: f.round_label.clone(),
                    rows: self.table.ranked(f.season, &f.round_label),
                });
            }
        }
        None
    }
}

/// Snapshots for fixtures of a single season, starting from `teams`.
pub fn round_snapshots<'a>(teams: &[TeamRecord], fixtures: &'a [FixtureRecord]) -> RoundSnapshots<'a> {
    let mut ordered: Vec<&FixtureRecord> = fixtures.iter().filter(|f| is_finished(&f.status_code)).collect();
    ordered.sort_by_key(|f| chronological_key(f));

    let mut seen = HashSet::new();
    let mut closes_round: Vec<bool> = ordered
        .iter()
        .rev()
        .map(|&f| seen.insert(f.round_label.as_str()))
        .collect();
    closes_round.reverse();

    RoundSnapshots {
        fixtures: ordered,
        closes_round,
        pos: 0,
        table: StandingsTable::seeded(teams),
    }
}

/// Per-round standings for every season present in `fixtures`, one table
/// per (season, round label), rounds ordered by matchday.
pub fn derive_standings_by_round(fixtures: &[FixtureRecord]) -> Vec<StandingRow> {
    derive_standings_by_round_seeded(&[], fixtures)
}

/// As `derive_standings_by_round`, with `teams` listed from the first round.
pub fn derive_standings_by_round_seeded(teams: &[TeamRecord], fixtures: &[FixtureRecord]) -> Vec<StandingRow> {
    let mut by_season: BTreeMap<u16, Vec<FixtureRecord>> = BTreeMap::new();
    for f in fixtures {
        by_season.entry(f.season).or_default().push(f.clone());
    }

    by_season
        .values()
        .flat_map(|season_fixtures| {
            let mut snapshots: Vec<RoundSnapshot> = round_snapshots(teams, season_fixtures).collect();
            snapshots.sort_by_key(|s| round_ordinal(&s.round_label).unwrap_or(u32::MAX));
            snapshots.into_iter().flat_map(|snapshot| snapshot.rows).collect::<Vec<_>>()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Final table
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiStandingsEntry {
    league: ApiStandingsLeague,
}

#[derive(Debug, Deserialize)]
struct ApiStandingsLeague {
    #[serde(default)]
    season: u16,
    #[serde(default)]
    standings: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiStandingLine {
    #[serde(default)]
    rank: Option<u32>,
    team: ApiTeam,
    #[serde(default)]
    points: u32,
    all: ApiRecord,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    #[serde(default)]
    played: u32,
    #[serde(default)]
    win: u32,
    #[serde(default)]
    draw: u32,
    #[serde(default)]
    lose: u32,
    goals: ApiGoals,
}

#[derive(Debug, Deserialize)]
struct ApiGoals {
    #[serde(rename = "for", default)]
    goals_for: u32,
    #[serde(default)]
    against: u32,
}

/// The upstream end-of-season table(s), labelled `"final"`.
///
/// Uses the payload rank when present, otherwise the position in the group.
pub fn derive_standings_final(payload: &Value) -> Result<Vec<StandingRow>, TransformError> {
    let items = response_items(payload)?;
    let mut rows = Vec::new();

    for entry in parse_items::<ApiStandingsEntry>(items, "standings") {
        let season = entry.league.season;
        for group in &entry.league.standings {
            for (pos, line) in parse_items::<ApiStandingLine>(group, "standing line").into_iter().enumerate() {
                rows.push(StandingRow {
                    season,
                    round_label: FINAL_ROUND_LABEL.to_string(),
                    rank: line.rank.unwrap_or(pos as u32 + 1),
                    team_id: line.team.id,
                    team_name: line.team.name,
                    points: line.points,
                    played: line.all.played,
                    win: line.all.win,
                    draw: line.all.draw,
                    lose: line.all.lose,
                    goals_for: line.all.goals.goals_for,
                    goals_against: line.all.goals.against,
                });
            }
        }
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
