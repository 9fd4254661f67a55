//! Collection planner: enumerates work units and drives the fetcher.
//!
//! Units are the product leagues × seasons × resources, ordered league
//! ascending, season descending, then resource priority (teams, fixtures,
//! standings). A run is meant to be repeated daily until every unit is
//! cached; running out of day budget is an ordinary stop, not a failure.

use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

use super::fetcher::{FetchSource, Fetcher};
use crate::types::{DenyReason, FetchError, Resource, UpstreamError, UpstreamErrorKind, WorkUnit};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Wait applied when the upstream itself reports a rate limit.
const UPSTREAM_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Waits allowed per unit on minute denials or upstream rate limits.
    pub max_minute_retries: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { max_minute_retries: 3 }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Why a unit was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BudgetExhausted,
    RunAborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Fetched,
    Cached,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub unit: WorkUnit,
    pub status: UnitStatus,
}

/// Why a run ended before visiting every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    DayBudgetExhausted,
    UpstreamRateLimited,
    Aborted,
}

/// Summary of one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub outcomes: Vec<UnitOutcome>,
    pub stop_reason: Option<StopReason>,
}

impl CollectionReport {
    fn count(&self, pred: impl Fn(&UnitStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn fetched(&self) -> usize {
        self.count(|s| *s == UnitStatus::Fetched)
    }

    pub fn cached(&self) -> usize {
        self.count(|s| *s == UnitStatus::Cached)
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Failed(_)))
    }

    /// Every unit is now available locally.
    pub fn is_complete(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o.status, UnitStatus::Fetched | UnitStatus::Cached))
    }

    pub fn failed_units(&self) -> Vec<&UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UnitStatus::Failed(_)))
            .collect()
    }

    fn push(&mut self, unit: WorkUnit, status: UnitStatus) {
        self.outcomes.push(UnitOutcome { unit, status });
    }
}

impl fmt::Display for CollectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "units={} fetched={} cached={} skipped={} failed={}",
            self.outcomes.len(),
            self.fetched(),
            self.cached(),
            self.skipped(),
            self.failed(),
        )?;
        if let Some(reason) = self.stop_reason {
            write!(f, " stopped={reason:?}")?;
        }
        Ok(())
    }
}

/// A run stopped by an authentication-class upstream error.
#[derive(Debug, thiserror::Error)]
#[error("Collection aborted on {unit}: {error}")]
pub struct RunAborted {
    pub unit: WorkUnit,
    pub error: UpstreamError,
    /// Progress up to the abort; remaining units are skipped.
    pub report: CollectionReport,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Per-unit result after retries are resolved.
enum UnitResult {
    Done(FetchSource),
    Failed(String),
    StopBudget(StopReason),
    Abort(UpstreamError),
}

pub struct CollectionPlanner {
    fetcher: Fetcher,
    config: PlannerConfig,
}

impl CollectionPlanner {
    pub fn new(fetcher: Fetcher, config: PlannerConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn fetcher_mut(&mut self) -> &mut Fetcher {
        &mut self.fetcher
    }

    /// All units in fetch order. Duplicate inputs are collapsed.
    pub fn plan(leagues: &[u32], seasons: &[u16], resources: &[Resource]) -> Vec<WorkUnit> {
        let mut leagues = leagues.to_vec();
        leagues.sort_unstable();
        leagues.dedup();

        let mut seasons = seasons.to_vec();
        seasons.sort_unstable_by(|a, b| b.cmp(a));
        seasons.dedup();

        let mut resources = resources.to_vec();
        resources.sort();
        resources.dedup();

        let mut units = Vec::with_capacity(leagues.len() * seasons.len() * resources.len());
        for &league in &leagues {
            for &season in &seasons {
                for &resource in &resources {
                    units.push(WorkUnit::new(resource, league, season));
                }
            }
        }
        units
    }

    /// Visit every planned unit once, fetching what is not cached.
    pub async fn run(
        &mut self,
        leagues: &[u32],
        seasons: &[u16],
        resources: &[Resource],
    ) -> Result<CollectionReport, RunAborted> {
        let units = Self::plan(leagues, seasons, resources);
        info!(units = units.len(), "Starting collection run");

        let mut report = CollectionReport::default();
        let mut pending = units.into_iter();

        while let Some(unit) = pending.next() {
            match self.fetch_unit(&unit).await {
                UnitResult::Done(FetchSource::Network) => report.push(unit, UnitStatus::Fetched),
                UnitResult::Done(FetchSource::Cache) => report.push(unit, UnitStatus::Cached),
                UnitResult::Failed(message) => {
                    warn!(unit = %unit, error = %message, "Unit failed, continuing");
                    report.push(unit, UnitStatus::Failed(message));
                }
                UnitResult::StopBudget(reason) => {
                    report.push(unit, UnitStatus::Skipped(SkipReason::BudgetExhausted));
                    for rest in pending.by_ref() {
                        report.push(rest, UnitStatus::Skipped(SkipReason::BudgetExhausted));
                    }
                    report.stop_reason = Some(reason);
                    info!(
                        skipped = report.skipped(),
                        reason = ?reason,
                        "Budget exhausted, stopping run; re-run later to continue"
                    );
                    break;
                }
                UnitResult::Abort(err) => {
                    report.push(unit, UnitStatus::Failed(err.to_string()));
                    for rest in pending.by_ref() {
                        report.push(rest, UnitStatus::Skipped(SkipReason::RunAborted));
                    }
                    report.stop_reason = Some(StopReason::Aborted);
                    error!(unit = %unit, kind = %err.kind, error = %err.message, "Fatal upstream error, aborting run");
                    return Err(RunAborted { unit, error: err, report });
                }
            }
        }

        info!(
            fetched = report.fetched(),
            cached = report.cached(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Collection run complete"
        );
        Ok(report)
    }

    /// Fetch one unit, waiting out minute windows up to the retry bound.
    async fn fetch_unit(&mut self, unit: &WorkUnit) -> UnitResult {
        let mut waits = 0;
        loop {
            let wait = match self.fetcher.fetch(unit).await {
                Ok(outcome) => return UnitResult::Done(outcome.source),
                Err(FetchError::Denied(denial)) => match denial.reason {
                    DenyReason::DenyDay => return UnitResult::StopBudget(StopReason::DayBudgetExhausted),
                    DenyReason::DenyMinute => {
                        if waits >= self.config.max_minute_retries {
                            return UnitResult::Failed(format!(
                                "minute budget did not clear after {waits} waits"
                            ));
                        }
                        denial.retry_after
                    }
                },
                Err(FetchError::Upstream(err)) => match err.kind {
                    kind if kind.is_fatal() => return UnitResult::Abort(err),
                    UpstreamErrorKind::RateLimited => {
                        if waits >= self.config.max_minute_retries {
                            return UnitResult::StopBudget(StopReason::UpstreamRateLimited);
                        }
                        UPSTREAM_RATE_LIMIT_WAIT
                    }
                    _ => return UnitResult::Failed(err.to_string()),
                },
                Err(FetchError::Cache(err)) => return UnitResult::Failed(err.to_string()),
            };

            waits += 1;
            info!(unit = %unit, wait_secs = wait.as_secs(), attempt = waits, "Waiting for rate window to clear");
            self.fetcher.clock().sleep(wait).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
