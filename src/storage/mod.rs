//! Persistence layer.
//!
//! The `UserStore` trait is the keyed record store for tracked entrants.
//! Records are keyed by `member_id`; `steam_id` is unique across records.
//! The SQLite implementation lives in [`sqlite`].

pub mod sqlite;

use async_trait::async_trait;

use crate::types::{LeaderboardResult, TrackedEntrant};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Every tracked entrant.
    async fn fetch_all(&self) -> LeaderboardResult<Vec<TrackedEntrant>>;

    async fn get(&self, member_id: &str) -> LeaderboardResult<Option<TrackedEntrant>>;

    /// Insert, or overwrite the record with the same `member_id`.
    async fn upsert(&self, entrant: &TrackedEntrant) -> LeaderboardResult<()>;

    /// Delete a record. Returns whether one existed.
    async fn remove(&self, member_id: &str) -> LeaderboardResult<bool>;
}
