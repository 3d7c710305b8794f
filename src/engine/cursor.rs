//! Page cursor over a `FeedFetcher`.
//!
//! Hides the page-token format from the reconciler: callers only see the
//! entries of each page and whether another page exists. Pages are fetched
//! lazily, one per `next()` call, so the feed is never buffered whole.

use tracing::debug;

use crate::platforms::FeedFetcher;
use crate::types::{FeedEntry, LeaderboardResult};

/// One page handed out by the cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorPage {
    pub entries: Vec<FeedEntry>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CursorState {
    /// Nothing fetched yet.
    Fresh,
    /// Another page exists behind this token.
    Pending(String),
    Exhausted,
}

/// Forward-only cursor over the pages of one feed, valid for one run.
pub struct PageCursor<'a, F: FeedFetcher + ?Sized> {
    fetcher: &'a F,
    state: CursorState,
    pages_fetched: usize,
}

impl<'a, F: FeedFetcher + ?Sized> PageCursor<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self {
            fetcher,
            state: CursorState::Fresh,
            pages_fetched: 0,
        }
    }

    /// Fetch the next page. Returns `Ok(None)` once the feed is exhausted.
    ///
    /// A failed fetch leaves the cursor where it was.
    pub async fn next(&mut self) -> LeaderboardResult<Option<CursorPage>> {
        let token = match &self.state {
            CursorState::Exhausted => return Ok(None),
            CursorState::Fresh => None,
            CursorState::Pending(token) => Some(token.as_str()),
        };

        let page = self.fetcher.fetch_page(token).await?;
        self.pages_fetched += 1;

        self.state = match page.next_token {
            Some(next) => CursorState::Pending(next),
            None => CursorState::Exhausted,
        };

        debug!(
            feed = self.fetcher.name(),
            page = self.pages_fetched,
            entries = page.entries.len(),
            has_more = self.has_more(),
            "Feed page received"
        );

        Ok(Some(CursorPage {
            entries: page.entries,
            has_more: self.has_more(),
        }))
    }

    /// Whether another page can still be fetched.
    pub fn has_more(&self) -> bool {
        !matches!(self.state, CursorState::Exhausted)
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}
