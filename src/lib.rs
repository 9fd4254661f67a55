//! League Collector: rate-budgeted, cache-first football data collection
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod upstream;
pub mod engine;
pub mod storage;
pub mod transform;
pub mod export;
