//! Collection engine.
//!
//! Clock → RateBudget → Fetcher → CollectionPlanner. The planner owns the
//! fetcher, which owns the budget; all of them share one clock.

pub mod clock;
pub mod budget;
pub mod fetcher;
pub mod planner;
