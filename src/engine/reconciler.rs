//! Rank bucket reconciler: tie-aware rank ranges over a paginated feed.
//!
//! The feed lists every entrant by score, best first. Entrants sharing a
//! score have no well-defined exact rank, so each tracked entrant is given
//! the inclusive range of ranks covered by its tie run instead.
//!
//! A tie run can only be closed once a strictly lower score shows up, since
//! until then its upper edge is unknown. Tracked members of the open run
//! are therefore held in a bucket and only receive their range when the
//! bucket closes, which may happen pages later.
//!
//! The scan stops as soon as nothing more can be learned: either the feed
//! ends, or every tracked entrant has been seen and no bucket holding one of
//! them is still open.

use std::collections::{HashMap, HashSet};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::cursor::PageCursor;
use crate::platforms::FeedFetcher;
use crate::types::{FeedEntry, LeaderboardError, LeaderboardResult, TrackedEntrant};

// ---------------------------------------------------------------------------
// Options and outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Assign ranges to the tie run still open when the feed ends.
    /// When false those entrants get their new score but keep their old range.
    pub flush_trailing_bucket: bool,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Updated snapshot, in the order the entrants were passed in.
    pub entrants: Vec<TrackedEntrant>,
    /// Distinct tracked entrants matched on the feed.
    pub resolved: usize,
    pub pages_fetched: usize,
    /// Tracked entrants left in the open bucket at feed end without a range.
    pub unflushed: usize,
}

// ---------------------------------------------------------------------------
// Bucket scan state
// ---------------------------------------------------------------------------

/// Tracked members of the tie run currently being read.
#[derive(Debug)]
struct ScoreBucket {
    members: Vec<String>,
    lower_rank: i64,
    upper_rank: i64,
}

impl ScoreBucket {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            lower_rank: 1,
            upper_rank: 1,
        }
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Write the bucket's range onto every member.
    fn assign(&self, tracked: &mut HashMap<String, TrackedEntrant>) {
        for steam_id in &self.members {
            if let Some(entrant) = tracked.get_mut(steam_id) {
                entrant.rank_lower_bound = self.lower_rank;
                entrant.rank_upper_bound = self.upper_rank;
            }
        }
    }

    /// Close the bucket and open a new one starting at `rank`.
    fn close(&mut self, tracked: &mut HashMap<String, TrackedEntrant>, rank: i64) {
        self.assign(tracked);
        if !self.members.is_empty() {
            debug!(
                members = self.members.len(),
                lower = self.lower_rank,
                upper = self.upper_rank,
                "Score bucket closed"
            );
        }
        self.members.clear();
        self.lower_rank = rank;
        self.upper_rank = rank;
    }
}

/// Running state of one scan across all pages.
struct BucketScan {
    bucket: ScoreBucket,
    previous_score: Option<i64>,
    resolved: HashSet<String>,
}

impl BucketScan {
    fn new() -> Self {
        Self {
            bucket: ScoreBucket::new(),
            previous_score: None,
            resolved: HashSet::new(),
        }
    }

    fn observe(
        &mut self,
        entry: FeedEntry,
        tracked: &mut HashMap<String, TrackedEntrant>,
    ) -> LeaderboardResult<()> {
        let previous = *self.previous_score.get_or_insert(entry.score);

        if entry.score == previous {
            self.bucket.upper_rank = entry.rank;
        } else if entry.score < previous {
            self.bucket.close(tracked, entry.rank);
        } else {
            return Err(LeaderboardError::FeedUnavailable(format!(
                "feed out of order: score {} at rank {} follows score {previous}",
                entry.score, entry.rank
            )));
        }

        if let Some(entrant) = tracked.get_mut(&entry.steam_id) {
            entrant.score = Some(entry.score);
            self.resolved.insert(entry.steam_id.clone());
            self.bucket.members.push(entry.steam_id);
        }

        self.previous_score = Some(entry.score);
        Ok(())
    }

    fn is_complete(&self, tracked_count: usize) -> bool {
        self.resolved.len() >= tracked_count && self.bucket.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Merges a tracked-entrant snapshot against the feed.
///
/// Holds no state between runs: every call receives its own snapshot and
/// cursor and returns the updated snapshot for the caller to persist.
#[derive(Debug, Clone, Default)]
pub struct RankBucketReconciler {
    options: ReconcileOptions,
    cancel: Option<watch::Receiver<bool>>,
}

impl RankBucketReconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self {
            options,
            cancel: None,
        }
    }

    /// Abort the run before the next page fetch once `true` is sent.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn reconcile<F: FeedFetcher + ?Sized>(
        &self,
        tracked: Vec<TrackedEntrant>,
        mut cursor: PageCursor<'_, F>,
    ) -> LeaderboardResult<ReconcileOutcome> {
        let tracked_count = tracked.len();
        let order: Vec<String> = tracked.iter().map(|e| e.steam_id.clone()).collect();

        let mut by_steam_id: HashMap<String, TrackedEntrant> = HashMap::with_capacity(tracked_count);
        for entrant in tracked {
            let key = entrant.steam_id.clone();
            if by_steam_id.insert(key.clone(), entrant).is_some() {
                return Err(LeaderboardError::DuplicateEntrant(key));
            }
        }

        let mut scan = BucketScan::new();

        loop {
            self.check_cancelled()?;

            let Some(page) = cursor.next().await? else {
                break;
            };

            for entry in page.entries {
                scan.observe(entry, &mut by_steam_id)?;
            }

            if !page.has_more {
                debug!(pages = cursor.pages_fetched(), "End of feed reached");
                break;
            }
            if scan.is_complete(tracked_count) {
                debug!(
                    pages = cursor.pages_fetched(),
                    resolved = scan.resolved.len(),
                    "All tracked entrants resolved, stopping early"
                );
                break;
            }
        }

        let mut unflushed = scan.bucket.members.len();
        if unflushed > 0 {
            if self.options.flush_trailing_bucket {
                scan.bucket.assign(&mut by_steam_id);
                debug!(
                    members = unflushed,
                    lower = scan.bucket.lower_rank,
                    upper = scan.bucket.upper_rank,
                    "Trailing score bucket flushed at end of feed"
                );
                unflushed = 0;
            } else {
                warn!(
                    members = unflushed,
                    lower = scan.bucket.lower_rank,
                    upper = scan.bucket.upper_rank,
                    "Feed ended inside a tie run; those entrants keep their previous rank range"
                );
            }
        }

        let entrants: Vec<TrackedEntrant> = order
            .iter()
            .filter_map(|steam_id| by_steam_id.remove(steam_id))
            .collect();

        let outcome = ReconcileOutcome {
            entrants,
            resolved: scan.resolved.len(),
            pages_fetched: cursor.pages_fetched(),
            unflushed,
        };

        info!(
            tracked = tracked_count,
            resolved = outcome.resolved,
            pages = outcome.pages_fetched,
            unflushed = outcome.unflushed,
            "Reconciliation complete"
        );

        Ok(outcome)
    }

    fn check_cancelled(&self) -> LeaderboardResult<()> {
        match &self.cancel {
            Some(rx) if *rx.borrow() => Err(LeaderboardError::Cancelled),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
