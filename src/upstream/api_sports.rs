//! API-Football (API-Sports v3) client.
//!
//! API docs: https://www.api-football.com/documentation-v3
//! Base URL: https://v3.football.api-sports.io
//! Auth: `x-apisports-key` header. Free tier: 10 req/min, 100 req/day.
//!
//! Endpoints used: `/teams`, `/fixtures`, `/standings`, each queried with
//! `league` and `season`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::FootballApi;
use crate::types::{UpstreamError, UpstreamErrorKind, WorkUnit};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://v3.football.api-sports.io";
const PROVIDER_NAME: &str = "api-sports";
const KEY_HEADER: &str = "x-apisports-key";

/// Longest error body excerpt carried into an `UpstreamError`.
const MAX_ERROR_BODY: usize = 200;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ApiSportsClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl ApiSportsClient {
    pub fn new(base_url: Option<String>, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("league-collector/0.1.0")
            .build()
            .context("Failed to build API-Sports HTTP client")?;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self { http, base_url, api_key })
    }

    pub fn endpoint_url(&self, unit: &WorkUnit) -> String {
        format!("{}/{}", self.base_url, unit.resource.endpoint())
    }

    /// Map a non-success HTTP status to an error kind.
    fn status_kind(status: StatusCode) -> UpstreamErrorKind {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamErrorKind::InvalidKey,
            StatusCode::TOO_MANY_REQUESTS => UpstreamErrorKind::RateLimited,
            _ => UpstreamErrorKind::Other,
        }
    }
}

#[async_trait]
impl FootballApi for ApiSportsClient {
    async fn get(&self, unit: WorkUnit) -> Result<Value, UpstreamError> {
        let url = self.endpoint_url(&unit);
        debug!(url = %url, league = unit.league_id, season = unit.season, "Requesting API-Sports");

        let resp = self
            .http
            .get(&url)
            .header(KEY_HEADER, self.api_key.expose_secret())
            .query(&[
                ("league", unit.league_id.to_string()),
                ("season", unit.season.to_string()),
            ])
            .send()
            .await
            .map_err(|e| UpstreamError::new(UpstreamErrorKind::Other, format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(UpstreamError::new(
                Self::status_kind(status),
                format!("HTTP {status}: {body}"),
            ));
        }

        let payload: Value = resp.json().await.map_err(|e| {
            UpstreamError::new(UpstreamErrorKind::Other, format!("invalid JSON body: {e}"))
        })?;

        let results = payload.get("results").and_then(serde_json::Value::as_u64).unwrap_or(0);
        info!(unit = %unit, results, "API-Sports response received");
        Ok(payload)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
