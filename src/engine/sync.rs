//! One sync run: load snapshot → reconcile against the feed → persist.
//!
//! A run is all-or-nothing up to the end of reconciliation: if the feed
//! fails at any page nothing is written. Once reconciliation succeeds each
//! entrant is upserted independently, and a failed upsert is reported
//! without stopping the rest.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::cursor::PageCursor;
use super::reconciler::RankBucketReconciler;
use crate::platforms::FeedFetcher;
use crate::storage::UserStore;
use crate::types::LeaderboardResult;

/// An entrant whose updated record could not be written.
#[derive(Debug, Clone, Serialize)]
pub struct UpsertFailure {
    pub member_id: String,
    pub error: String,
}

/// Summary of a completed sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tracked: usize,
    pub resolved: usize,
    pub pages_fetched: usize,
    pub unflushed: usize,
    pub upserted: usize,
    pub failures: Vec<UpsertFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs reconciliation passes against a store and a feed.
pub struct SyncRunner {
    reconciler: RankBucketReconciler,
}

impl SyncRunner {
    pub fn new(reconciler: RankBucketReconciler) -> Self {
        Self { reconciler }
    }

    pub async fn run_once<S, F>(&self, store: &S, feed: &F) -> LeaderboardResult<SyncReport>
    where
        S: UserStore + ?Sized,
        F: FeedFetcher + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let tracked = store.fetch_all().await?;
        let tracked_count = tracked.len();
        info!(%run_id, feed = feed.name(), tracked = tracked_count, "Sync run started");

        let outcome = match self
            .reconciler
            .reconcile(tracked, PageCursor::new(feed))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%run_id, error = %e, "Sync run aborted, nothing persisted");
                return Err(e);
            }
        };

        let mut upserted = 0;
        let mut failures = Vec::new();
        for entrant in &outcome.entrants {
            match store.upsert(entrant).await {
                Ok(()) => upserted += 1,
                Err(e) => {
                    error!(%run_id, member_id = %entrant.member_id, error = %e, "Failed to persist entrant");
                    failures.push(UpsertFailure {
                        member_id: entrant.member_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let report = SyncReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            tracked: tracked_count,
            resolved: outcome.resolved,
            pages_fetched: outcome.pages_fetched,
            unflushed: outcome.unflushed,
            upserted,
            failures,
        };

        if report.is_clean() {
            info!(
                %run_id,
                resolved = report.resolved,
                pages = report.pages_fetched,
                upserted = report.upserted,
                "Sync run complete"
            );
        } else {
            warn!(
                %run_id,
                upserted = report.upserted,
                failed = report.failures.len(),
                "Sync run complete with persistence failures"
            );
        }

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
