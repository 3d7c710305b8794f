//! External platform integrations.
//!
//! Defines the `FeedFetcher` trait and provides implementations for:
//! - Steam community leaderboards: the paginated ranking feed (XML)
//! - Steam Web API profile lookup: vanity URL to Steam id resolution

pub mod steam_leaderboard;
pub mod steam_profile;

use async_trait::async_trait;

use crate::types::{FeedPage, LeaderboardResult};

/// Abstraction over a paginated, score-sorted ranking feed.
///
/// Implementors fetch exactly one page per call. Entries keep the feed's
/// native order and carry global (not page-relative) ranks. Any transport
/// or payload problem is reported as `LeaderboardError::FeedUnavailable`.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch a page. `None` requests the first page; otherwise the token
    /// returned alongside the previous page.
    async fn fetch_page(&self, token: Option<&str>) -> LeaderboardResult<FeedPage>;

    /// Feed name for logging and identification.
    fn name(&self) -> &str;
}
