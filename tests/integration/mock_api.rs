//! Mock football API for integration testing.
//!
//! Provides a deterministic `FootballApi` implementation serving canned
//! API-Sports shaped payloads for league 71, recording every call and
//! optionally failing on demand. Clones share state, so a test can keep a
//! handle after boxing one into a `Fetcher`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use league_collector::types::{Resource, UpstreamError, UpstreamErrorKind, WorkUnit};
use league_collector::upstream::FootballApi;

/// What a forced failure looks like on the wire.
#[derive(Debug, Clone)]
pub enum Failure {
    /// HTTP 200 with an `errors` body.
    Body(Value),
    /// Transport or HTTP status failure.
    Transport(UpstreamError),
}

#[derive(Clone, Default)]
pub struct MockFootballApi {
    calls: Arc<Mutex<Vec<WorkUnit>>>,
    /// Failure applied to every call, or only to one resource.
    failure: Arc<Mutex<Option<(Option<Resource>, Failure)>>>,
}

impl MockFootballApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent call.
    pub fn fail_all(&self, failure: Failure) {
        *self.failure.lock().unwrap() = Some((None, failure));
    }

    /// Fail subsequent calls for one resource only.
    pub fn fail_resource(&self, resource: Resource, failure: Failure) {
        *self.failure.lock().unwrap() = Some((Some(resource), failure));
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Every unit requested so far, in order.
    pub fn calls(&self) -> Vec<WorkUnit> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The body API-Sports sends for a bad key.
    pub fn invalid_key_body() -> Value {
        json!({
            "get": "fixtures",
            "parameters": {"league": "71", "season": "2024"},
            "errors": {"token": "Error/Missing application key. Go to https://www.api-football.com/documentation-v3 to learn how to get your API application key."},
            "results": 0,
            "response": []
        })
    }

    /// The body API-Sports sends once the per-minute counter is exceeded.
    pub fn rate_limit_body() -> Value {
        json!({
            "errors": {"rateLimit": "Too many requests. Your rate limit is 10 requests per minute."},
            "results": 0,
            "response": []
        })
    }

    fn payload(unit: &WorkUnit) -> Value {
        let response = match unit.resource {
            Resource::Teams => teams(),
            Resource::Fixtures => fixtures(unit.season),
            Resource::Standings => standings(unit.season),
        };
        json!({
            "get": unit.resource.endpoint(),
            "parameters": {"league": unit.league_id.to_string(), "season": unit.season.to_string()},
            "errors": [],
            "results": response.as_array().map(Vec::len).unwrap_or(0),
            "response": response
        })
    }
}

#[async_trait]
impl FootballApi for MockFootballApi {
    async fn get(&self, unit: WorkUnit) -> Result<Value, UpstreamError> {
        self.calls.lock().unwrap().push(unit);

        let failure = self.failure.lock().unwrap().clone();
        match failure {
            Some((scope, failure)) if scope.map_or(true, |r| r == unit.resource) => match failure {
                Failure::Body(body) => Ok(body),
                Failure::Transport(err) => Err(err),
            },
            _ => Ok(Self::payload(&unit)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A transport-level failure that does not stop the run.
pub fn server_error() -> Failure {
    Failure::Transport(UpstreamError::new(UpstreamErrorKind::Other, "HTTP 502: Bad Gateway"))
}

// ---------------------------------------------------------------------------
// Canned payloads
// ---------------------------------------------------------------------------

const TEAMS: [(u32, &str); 4] = [
    (127, "Flamengo"),
    (121, "Palmeiras"),
    (131, "Corinthians"),
    (126, "Sao Paulo"),
];

fn team(id: u32) -> Value {
    let name = TEAMS.iter().find(|(t, _)| *t == id).map(|(_, n)| *n).unwrap_or("Unknown");
    json!({"id": id, "name": name})
}

fn teams() -> Value {
    Value::Array(
        TEAMS
            .iter()
            .map(|&(id, name)| json!({"team": {"id": id, "name": name, "country": "Brazil"}, "venue": {}}))
            .collect(),
    )
}

fn fixture(season: u16, id: u64, date: &str, round: u32, home: u32, away: u32, score: Option<(u32, u32)>) -> Value {
    let (status, goals) = match score {
        Some((h, a)) => (json!({"long": "Match Finished", "short": "FT", "elapsed": 90}), json!({"home": h, "away": a})),
        None => (json!({"long": "Time To Be Defined", "short": "TBD", "elapsed": null}), json!({"home": null, "away": null})),
    };
    json!({
        "fixture": {"id": id, "date": format!("{season}-{date}"), "status": status},
        "league": {"id": 71, "season": season, "round": format!("Regular Season - {round}")},
        "teams": {"home": team(home), "away": team(away)},
        "goals": goals
    })
}

/// Two played rounds and one undated match per season.
fn fixtures(season: u16) -> Value {
    let base = u64::from(season) * 1000;
    json!([
        fixture(season, base + 1, "04-13T21:30:00+00:00", 1, 127, 121, Some((2, 1))),
        fixture(season, base + 2, "04-14T19:00:00+00:00", 1, 131, 126, Some((0, 0))),
        fixture(season, base + 3, "04-20T21:30:00+00:00", 2, 121, 131, Some((3, 0))),
        fixture(season, base + 4, "04-21T19:00:00+00:00", 2, 126, 127, Some((1, 1))),
        fixture(season, base + 5, "12-08T19:00:00+00:00", 38, 127, 131, None),
    ])
}

fn standings(season: u16) -> Value {
    let line = |rank: u32, id: u32, points: u32, w: u32, d: u32, l: u32, gf: u32, ga: u32| {
        json!({
            "rank": rank, "team": team(id), "points": points, "goalsDiff": i64::from(gf) - i64::from(ga),
            "all": {"played": w + d + l, "win": w, "draw": d, "lose": l, "goals": {"for": gf, "against": ga}}
        })
    };
    json!([{
        "league": {
            "id": 71, "season": season,
            "standings": [[
                line(1, 121, 70, 20, 10, 8, 64, 33),
                line(2, 127, 66, 19, 9, 10, 56, 42),
                line(3, 126, 53, 14, 11, 13, 40, 41),
                line(4, 131, 50, 12, 14, 12, 47, 48),
            ]]
        }
    }])
}
