//! leaderboard-sync: tie-aware rank tracking on a paginated Steam leaderboard
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod platforms;
pub mod engine;
pub mod storage;
pub mod dashboard;
