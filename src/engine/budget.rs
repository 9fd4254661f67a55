//! Request budget: per-minute and per-day call limits.
//!
//! Every outbound call must first obtain a slot from `RateBudget::reserve`.
//! The minute limit is a sliding 60-second window over granted slots; the
//! day limit resets at each UTC midnight. State is process-scoped: a fresh
//! process assumes zero usage, and the response cache is what actually
//! keeps repeated runs from re-spending quota.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::clock::Clock;
use crate::types::{Denial, DenyReason, Reservation};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Length of the minute window in seconds.
const MINUTE_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct BudgetConfig {
    pub per_minute: u32,
    pub per_day: u32,
    /// Pause taken after every network attempt to smooth bursts.
    pub pacing: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            per_minute: 10,
            per_day: 100,
            pacing: Duration::from_secs(1),
        }
    }
}

/// Snapshot of the budget counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetState {
    pub minute_window_count: u32,
    pub minute_window_start: DateTime<Utc>,
    pub day_count: u32,
    pub day_window_start: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RateBudget
// ---------------------------------------------------------------------------

pub struct RateBudget {
    config: BudgetConfig,
    clock: Arc<dyn Clock>,
    /// Grant timestamps still inside the minute window, oldest first.
    minute_grants: VecDeque<DateTime<Utc>>,
    day_count: u32,
    day_window_start: DateTime<Utc>,
}

impl RateBudget {
    pub fn new(config: BudgetConfig, clock: Arc<dyn Clock>) -> Self {
        let day_window_start = start_of_utc_day(clock.now());
        Self {
            config,
            clock,
            minute_grants: VecDeque::new(),
            day_count: 0,
            day_window_start,
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    pub fn pacing(&self) -> Duration {
        self.config.pacing
    }

    /// Try to take one call slot. On `Allow` both counters are incremented.
    pub fn reserve(&mut self) -> Reservation {
        let now = self.clock.now();
        self.roll_windows(now);

        // Day first: an exhausted day must stop the run, not trigger a wait.
        if self.day_count >= self.config.per_day {
            let denial = Denial {
                reason: DenyReason::DenyDay,
                retry_after: to_std(next_utc_midnight(self.day_window_start) - now),
            };
            debug!(day_count = self.day_count, limit = self.config.per_day, "Day budget denied");
            return Reservation::Deny(denial);
        }

        if self.minute_grants.len() as u32 >= self.config.per_minute {
            let oldest = self.minute_grants.front().copied().unwrap_or(now);
            let denial = Denial {
                reason: DenyReason::DenyMinute,
                retry_after: to_std(oldest + ChronoDuration::seconds(MINUTE_WINDOW_SECS) - now),
            };
            debug!(
                minute_count = self.minute_grants.len(),
                limit = self.config.per_minute,
                retry_after_ms = denial.retry_after.as_millis() as u64,
                "Minute budget denied"
            );
            return Reservation::Deny(denial);
        }

        self.minute_grants.push_back(now);
        self.day_count += 1;
        debug!(
            minute_count = self.minute_grants.len(),
            day_count = self.day_count,
            "Budget slot reserved"
        );
        Reservation::Allow
    }

    /// Current counters, with expired windows rolled forward.
    pub fn state(&mut self) -> BudgetState {
        let now = self.clock.now();
        self.roll_windows(now);
        BudgetState {
            minute_window_count: self.minute_grants.len() as u32,
            minute_window_start: self.minute_grants.front().copied().unwrap_or(now),
            day_count: self.day_count,
            day_window_start: self.day_window_start,
        }
    }

    /// Calls still available today.
    pub fn remaining_today(&mut self) -> u32 {
        let now = self.clock.now();
        self.roll_windows(now);
        self.config.per_day.saturating_sub(self.day_count)
    }

    fn roll_windows(&mut self, now: DateTime<Utc>) {
        let window = ChronoDuration::seconds(MINUTE_WINDOW_SECS);
        while let Some(&oldest) = self.minute_grants.front() {
            if now - oldest >= window {
                self.minute_grants.pop_front();
            } else {
                break;
            }
        }

        if now >= next_utc_midnight(self.day_window_start) {
            debug!(previous = self.day_count, "UTC day rolled over, day budget reset");
            self.day_count = 0;
            self.day_window_start = start_of_utc_day(now);
        }
    }
}

/// The UTC midnight at or before `t`.
fn start_of_utc_day(t: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = t.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&midnight)
}

/// The first UTC midnight strictly after `t`.
fn next_utc_midnight(t: DateTime<Utc>) -> DateTime<Utc> {
    let next_day = t.date_naive() + ChronoDuration::days(1);
    let midnight = next_day.and_hms_opt(0, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&midnight)
}

fn to_std(d: ChronoDuration) -> Duration {
    d.to_std().unwrap_or(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
