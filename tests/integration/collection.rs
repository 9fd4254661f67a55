//! End-to-end collection runs against an on-disk cache.
//!
//! Each test drives the real planner, fetcher, budget and cache with the
//! in-memory mock upstream and a manual clock, so waits cost nothing and
//! budget windows are deterministic.

use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use league_collector::engine::budget::{BudgetConfig, RateBudget};
use league_collector::engine::clock::{Clock, ManualClock};
use league_collector::engine::fetcher::Fetcher;
use league_collector::engine::planner::{
    CollectionPlanner, PlannerConfig, SkipReason, StopReason, UnitStatus,
};
use league_collector::export;
use league_collector::storage::ResponseCache;
use league_collector::types::{Resource, UpstreamErrorKind, WorkUnit};

use crate::mock_api::{server_error, Failure, MockFootballApi};

const LEAGUE: u32 = 71;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn budget(per_minute: u32, per_day: u32) -> BudgetConfig {
    BudgetConfig { per_minute, per_day, pacing: Duration::from_secs(1) }
}

struct Harness {
    planner: CollectionPlanner,
    api: MockFootballApi,
    clock: Arc<ManualClock>,
}

fn harness(cache_dir: &Path, config: BudgetConfig, clock: Arc<ManualClock>) -> Harness {
    let api = MockFootballApi::new();
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let fetcher = Fetcher::new(
        Box::new(api.clone()),
        ResponseCache::new(cache_dir),
        RateBudget::new(config, clock_dyn.clone()),
        clock_dyn,
    );
    Harness {
        planner: CollectionPlanner::new(fetcher, PlannerConfig::default()),
        api,
        clock,
    }
}

fn cache_files(cache_dir: &Path) -> Vec<String> {
    let league_dir = cache_dir.join(format!("league_{LEAGUE}"));
    let mut names: Vec<String> = match std::fs::read_dir(&league_dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

#[tokio::test]
async fn test_cold_run_then_warm_run_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let seasons = [2022, 2023, 2024];

    let mut cold = harness(dir.path(), budget(10, 100), clock.clone());
    let report = cold.planner.run(&[LEAGUE], &seasons, &Resource::ALL).await.unwrap();

    assert_eq!(report.fetched(), 9);
    assert!(report.is_complete());
    assert_eq!(cold.api.call_count(), 9);
    assert_eq!(cache_files(dir.path()).len(), 9);
    // Newest season first, teams before fixtures before standings.
    assert_eq!(cold.api.calls()[0], WorkUnit::new(Resource::Teams, LEAGUE, 2024));
    assert_eq!(cold.api.calls()[8], WorkUnit::new(Resource::Standings, LEAGUE, 2022));

    // A fresh process: new budget, same cache directory.
    let mut warm = harness(dir.path(), budget(10, 100), clock.clone());
    let slept_before = clock.total_slept();
    let first = warm.planner.run(&[LEAGUE], &seasons, &Resource::ALL).await.unwrap();
    let second = warm.planner.run(&[LEAGUE], &seasons, &Resource::ALL).await.unwrap();

    assert_eq!(warm.api.call_count(), 0);
    assert_eq!(first.cached(), 9);
    assert_eq!(first.fetched(), 0);
    assert_eq!(first, second);
    assert_eq!(warm.planner.fetcher_mut().budget_mut().remaining_today(), 100);
    assert_eq!(clock.total_slept(), slept_before);
}

#[tokio::test]
async fn test_day_budget_stops_run_and_resumes_next_day() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let mut h = harness(dir.path(), budget(10, 2), clock);

    let report = h.planner.run(&[LEAGUE], &[2024], &Resource::ALL).await.unwrap();

    assert_eq!(report.fetched(), 2);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.stop_reason, Some(StopReason::DayBudgetExhausted));
    assert_eq!(
        report.outcomes[2].status,
        UnitStatus::Skipped(SkipReason::BudgetExhausted)
    );
    assert!(!report.is_complete());
    assert_eq!(h.api.call_count(), 2);
    assert_eq!(
        cache_files(dir.path()),
        vec!["season_2024_fixtures.json", "season_2024_teams.json"]
    );
    // Never slept toward midnight.
    assert_eq!(h.clock.total_slept(), Duration::from_secs(2));

    h.clock.advance(Duration::from_secs(24 * 3600));
    let resumed = h.planner.run(&[LEAGUE], &[2024], &Resource::ALL).await.unwrap();

    assert!(resumed.is_complete());
    assert_eq!(resumed.cached(), 2);
    assert_eq!(resumed.fetched(), 1);
    assert_eq!(h.api.call_count(), 3);
    assert_eq!(h.api.calls()[2], WorkUnit::new(Resource::Standings, LEAGUE, 2024));
}

#[tokio::test]
async fn test_minute_budget_waits_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let mut h = harness(dir.path(), budget(2, 100), clock);

    let report = h.planner.run(&[LEAGUE], &[2024], &Resource::ALL).await.unwrap();

    assert_eq!(report.fetched(), 3);
    assert!(report.is_complete());
    // Two paced calls, a 58 s wait for the first grant to age out, one more paced call.
    assert_eq!(h.clock.total_slept(), Duration::from_secs(61));
}

#[tokio::test]
async fn test_invalid_key_aborts_without_cache_write() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let mut h = harness(dir.path(), budget(10, 100), clock);
    h.api.fail_all(Failure::Body(MockFootballApi::invalid_key_body()));

    let aborted = h
        .planner
        .run(&[LEAGUE], &[2024, 2023], &Resource::ALL)
        .await
        .unwrap_err();

    assert_eq!(aborted.error.kind, UpstreamErrorKind::InvalidKey);
    assert_eq!(aborted.unit, WorkUnit::new(Resource::Teams, LEAGUE, 2024));
    assert_eq!(h.api.call_count(), 1);
    assert!(cache_files(dir.path()).is_empty());
    assert!(!h.planner.fetcher().cache().has(&aborted.unit));

    let report = aborted.report;
    assert_eq!(report.stop_reason, Some(StopReason::Aborted));
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 5);
    assert!(report.outcomes[1..]
        .iter()
        .all(|o| o.status == UnitStatus::Skipped(SkipReason::RunAborted)));
}

#[tokio::test]
async fn test_upstream_rate_limit_waits_then_stops() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let mut h = harness(dir.path(), budget(10, 100), clock);
    h.api.fail_all(Failure::Body(MockFootballApi::rate_limit_body()));

    let report = h.planner.run(&[LEAGUE], &[2024], &Resource::ALL).await.unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::UpstreamRateLimited));
    assert_eq!(report.skipped(), 3);
    // One attempt plus one per allowed wait.
    assert_eq!(h.api.call_count(), 4);
    assert!(cache_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_failed_unit_is_retried_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let mut h = harness(dir.path(), budget(10, 100), clock);
    h.api.fail_resource(Resource::Fixtures, server_error());

    let report = h.planner.run(&[LEAGUE], &[2024], &Resource::ALL).await.unwrap();

    assert_eq!(report.fetched(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.stop_reason, None);
    assert_eq!(report.failed_units()[0].unit.resource, Resource::Fixtures);
    assert!(!h.planner.fetcher().cache().has(&WorkUnit::new(Resource::Fixtures, LEAGUE, 2024)));

    h.api.clear_failure();
    let retry = h.planner.run(&[LEAGUE], &[2024], &Resource::ALL).await.unwrap();

    assert!(retry.is_complete());
    assert_eq!(retry.fetched(), 1);
    assert_eq!(retry.cached(), 2);
    assert_eq!(h.api.call_count(), 4);
}

#[tokio::test]
async fn test_invalidated_entry_is_fetched_again() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(start()));
    let mut h = harness(dir.path(), budget(10, 100), clock);
    h.planner.run(&[LEAGUE], &[2024], &Resource::ALL).await.unwrap();

    let standings = WorkUnit::new(Resource::Standings, LEAGUE, 2024);
    assert!(h.planner.fetcher().cache().invalidate(&standings).unwrap());
    assert!(!h.planner.fetcher().cache().invalidate(&standings).unwrap());

    let report = h.planner.run(&[LEAGUE], &[2024], &Resource::ALL).await.unwrap();
    assert_eq!(report.fetched(), 1);
    assert_eq!(h.api.calls().last(), Some(&standings));
}

#[tokio::test]
async fn test_exports_identical_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");
    let clock = Arc::new(ManualClock::new(start()));
    let seasons = [2023, 2024];

    let mut h = harness(&cache_dir, budget(10, 100), clock.clone());
    h.planner.run(&[LEAGUE], &seasons, &Resource::ALL).await.unwrap();
    let cache = h.planner.fetcher().cache().clone();
    let first_out = dir.path().join("out1");
    let first = export::export_all(&cache, &[LEAGUE], &seasons, &first_out).unwrap();

    let mut again = harness(&cache_dir, budget(10, 100), clock);
    again.planner.run(&[LEAGUE], &seasons, &Resource::ALL).await.unwrap();
    assert_eq!(again.api.call_count(), 0);
    let second_out = dir.path().join("out2");
    let second = export::export_all(&cache, &[LEAGUE], &seasons, &second_out).unwrap();

    assert_eq!(first, second);
    // 4 finished fixtures per season; 4 teams x 2 rounds; 4 final rows.
    assert_eq!(first.results, 8);
    assert_eq!(first.standings_by_round, 16);
    assert_eq!(first.standings_final, 8);

    for name in [export::RESULTS_FILE, export::STANDINGS_BY_ROUND_FILE, export::STANDINGS_FINAL_FILE] {
        let a = std::fs::read_to_string(first_out.join(name)).unwrap();
        let b = std::fs::read_to_string(second_out.join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between runs");
    }

    // After round 2 of 2024: Flamengo W+D = 4, Palmeiras L+W = 3, Corinthians D+L = 1, Sao Paulo D+D = 2.
    let by_round = std::fs::read_to_string(first_out.join(export::STANDINGS_BY_ROUND_FILE)).unwrap();
    let leader = by_round
        .lines()
        .find(|l| l.starts_with("2024,Regular Season - 2,1,"))
        .unwrap();
    assert!(leader.contains(",127,Flamengo,"));
    assert!(leader.ends_with(",4"));
}
