//! League Collector entry point.
//!
//! Loads configuration, initialises structured logging, runs one
//! collection pass over every configured league and season, then rebuilds
//! the CSV exports from the cache. Meant to be re-run (e.g. daily) until
//! every unit is cached.
//!
//! Exit codes: 0 when every unit is cached, 2 when the run stopped early
//! on a budget limit or left failed units, 1 on a fatal error.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use league_collector::config::AppConfig;
use league_collector::engine::budget::RateBudget;
use league_collector::engine::clock::{Clock, SystemClock};
use league_collector::engine::fetcher::Fetcher;
use league_collector::engine::planner::{CollectionPlanner, CollectionReport, UnitStatus};
use league_collector::export;
use league_collector::storage::ResponseCache;
use league_collector::upstream::api_sports::ApiSportsClient;
use league_collector::upstream::FootballApi;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("COLLECTOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = match AppConfig::load_or_default(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::from(1);
        }
    };

    init_logging();

    match run(&cfg).await {
        Ok(report) if report.is_complete() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            error!(error = format!("{e:#}"), "Collection failed");
            ExitCode::from(1)
        }
    }
}

/// One collection pass followed by an export from the cache.
async fn run(cfg: &AppConfig) -> Result<CollectionReport> {
    let api_key = cfg.resolve_api_key()?;
    let client = ApiSportsClient::new(
        Some(cfg.api.base_url.clone()),
        api_key,
        Duration::from_secs(cfg.api.timeout_secs),
    )?;

    info!(
        upstream = client.name(),
        base_url = %cfg.api.base_url,
        leagues = ?cfg.collection.leagues,
        seasons = ?cfg.collection.seasons,
        per_minute = cfg.budget.per_minute,
        per_day = cfg.budget.per_day,
        "League collector starting up"
    );

    let cache = ResponseCache::new(&cfg.storage.cache_dir);
    for &league in &cfg.collection.leagues {
        let cached = cache.cached_units(league, &cfg.collection.seasons);
        info!(
            league,
            cached = cached.len(),
            planned = cfg.collection.seasons.len() * cfg.collection.resources.len(),
            "Cache status"
        );
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let budget = RateBudget::new(cfg.budget.budget_config(), clock.clone());
    let fetcher = Fetcher::new(Box::new(client), cache.clone(), budget, clock);
    let mut planner = CollectionPlanner::new(fetcher, cfg.budget.planner_config());

    let report = planner
        .run(&cfg.collection.leagues, &cfg.collection.seasons, &cfg.collection.resources)
        .await?;
    log_report(&report);

    let remaining = planner.fetcher_mut().budget_mut().remaining_today();
    info!(
        network_calls = planner.fetcher().network_calls(),
        remaining_today = remaining,
        "Budget after run"
    );

    export::export_all(
        &cache,
        &cfg.collection.leagues,
        &cfg.collection.seasons,
        Path::new(&cfg.storage.output_dir),
    )
    .context("Export failed")?;

    Ok(report)
}

/// Log a human-readable run summary.
fn log_report(report: &CollectionReport) {
    for outcome in report.failed_units() {
        if let UnitStatus::Failed(message) = &outcome.status {
            warn!(unit = %outcome.unit, error = %message, "Unit failed; will retry on next run");
        }
    }
    info!(
        summary = %report,
        complete = report.is_complete(),
        "Run complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("league_collector=info"));

    if std::env::var("COLLECTOR_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
