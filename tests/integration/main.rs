//! Integration test harness.

mod mock_feed;
mod sync_pipeline;
