//! Transformer: flat tables derived from cached payloads.
//!
//! Everything here is pure: payloads in, records out. Elements of the
//! upstream `response` array that do not have the expected shape are
//! skipped and logged rather than failing the whole table.

pub mod fixtures;
pub mod standings;

pub use fixtures::{derive_fixtures, is_finished, round_ordinal, FINISHED_STATUSES};
pub use standings::{
    derive_standings_by_round, derive_standings_by_round_seeded, derive_standings_final,
    round_snapshots, RoundSnapshot, StandingsTable,
};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{TeamRecord, TransformError};

/// The `response` array of a payload.
fn response_items(payload: &Value) -> Result<&[Value], TransformError> {
    payload
        .get("response")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or(TransformError::MissingResponse)
}

/// Deserialize every element that fits `T`, skipping the rest.
fn parse_items<T: DeserializeOwned>(items: &[Value], what: &str) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(index = i, kind = what, error = %e, "Skipping malformed element");
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTeam {
    pub id: u32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ApiTeamEntry {
    team: ApiTeam,
}

/// Teams listed in a `/teams` payload, in payload order.
pub fn derive_teams(payload: &Value) -> Result<Vec<TeamRecord>, TransformError> {
    let items = response_items(payload)?;
    Ok(parse_items::<ApiTeamEntry>(items, "team")
        .into_iter()
        .map(|e| TeamRecord { team_id: e.team.id, name: e.team.name })
        .collect())
}
