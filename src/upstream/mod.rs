//! Upstream football-data API.
//!
//! Defines the `FootballApi` trait the fetcher calls on a cache miss, and
//! the inspection of the `errors` field API-Sports embeds in otherwise
//! successful (HTTP 200) responses.

pub mod api_sports;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{UpstreamError, UpstreamErrorKind, WorkUnit};

/// Abstraction over the league-data provider.
///
/// Implementors issue exactly one request per call and return the raw
/// JSON body. Interpreting the body is the caller's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FootballApi: Send + Sync {
    /// Fetch the raw payload for one unit of work.
    async fn get(&self, unit: WorkUnit) -> Result<Value, UpstreamError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Inspect a response body for embedded errors.
///
/// API-Sports reports failures as `"errors": [...]` or
/// `"errors": {"token": "..."}`; an empty array/object or a missing field
/// means success. A body without a `response` array is also rejected so
/// it never reaches the cache.
pub fn check_payload(payload: &Value) -> Result<(), UpstreamError> {
    let messages: Vec<(String, String)> = match payload.get("errors") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| (String::new(), value_text(v)))
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_text(v)))
            .collect(),
        Some(Value::String(s)) if s.is_empty() => Vec::new(),
        Some(other) => vec![(String::new(), value_text(other))],
    };

    if !messages.is_empty() {
        // The most severe classification wins.
        let kind = messages
            .iter()
            .map(|(k, m)| classify(k, m))
            .min_by_key(|kind| severity(*kind))
            .unwrap_or(UpstreamErrorKind::Other);
        let message = messages
            .iter()
            .map(|(k, m)| if k.is_empty() { m.clone() } else { format!("{k}: {m}") })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(UpstreamError::new(kind, message));
    }

    if !payload.get("response").is_some_and(Value::is_array) {
        return Err(UpstreamError::new(
            UpstreamErrorKind::Other,
            "response body has no `response` array",
        ));
    }

    Ok(())
}

/// Map one error entry to a kind using its key and message.
pub fn classify(key: &str, message: &str) -> UpstreamErrorKind {
    let key = key.to_lowercase();
    let msg = message.to_lowercase();
    let has = |pattern: &str| key.contains(pattern) || msg.contains(pattern);

    if has("token") || has("invalid_key") || has("application key") || has("api key")
        || msg.contains("key is") || key == "key"
    {
        UpstreamErrorKind::InvalidKey
    } else if has("expired") || has("suspended") || has("subscription") || key == "access" {
        UpstreamErrorKind::AccountExpired
    } else if has("ratelimit") || has("rate limit") || key == "requests"
        || msg.contains("too many requests") || msg.contains("request limit")
    {
        UpstreamErrorKind::RateLimited
    } else {
        UpstreamErrorKind::Other
    }
}

fn severity(kind: UpstreamErrorKind) -> u8 {
    match kind {
        UpstreamErrorKind::InvalidKey => 0,
        UpstreamErrorKind::AccountExpired => 1,
        UpstreamErrorKind::RateLimited => 2,
        UpstreamErrorKind::Other => 3,
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
