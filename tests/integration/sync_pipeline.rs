//! End-to-end sync runs: SQLite store + XML feed + reconciler.

use leaderboard_sync::engine::reconciler::{RankBucketReconciler, ReconcileOptions};
use leaderboard_sync::engine::sync::SyncRunner;
use leaderboard_sync::storage::sqlite::SqliteUserStore;
use leaderboard_sync::storage::UserStore;
use leaderboard_sync::types::{LeaderboardError, TrackedEntrant};

use crate::mock_feed::MockFeed;

async fn store_with(entrants: &[(&str, &str)]) -> SqliteUserStore {
    let store = SqliteUserStore::in_memory().await.unwrap();
    for (member_id, steam_id) in entrants {
        store
            .upsert(&TrackedEntrant::new(*member_id, *steam_id))
            .await
            .unwrap();
    }
    store
}

async fn entrant(store: &SqliteUserStore, member_id: &str) -> TrackedEntrant {
    store.get(member_id).await.unwrap().unwrap()
}

fn runner() -> SyncRunner {
    SyncRunner::new(RankBucketReconciler::default())
}

#[tokio::test]
async fn tied_entrants_share_rank_range() {
    let store = store_with(&[("alice", "A"), ("bob", "B")]).await;
    let feed = MockFeed::from_rows(&[("A", 100), ("B", 100), ("C", 90), ("D", 80)], 10);

    let report = runner().run_once(&store, &feed).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.upserted, 2);

    for member in ["alice", "bob"] {
        let e = entrant(&store, member).await;
        assert_eq!(e.score, Some(100));
        assert_eq!(e.rank_range(), Some((1, 2)));
    }
}

#[tokio::test]
async fn tie_across_pages_resolves_once_lower_score_seen() {
    let store = store_with(&[("alice", "A"), ("bob", "B")]).await;
    let feed = MockFeed::from_rows(&[("X", 120), ("A", 100), ("B", 100), ("C", 90), ("D", 80)], 2);

    let report = runner().run_once(&store, &feed).await.unwrap();
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(feed.fetch_count(), 2);

    assert_eq!(entrant(&store, "alice").await.rank_range(), Some((2, 3)));
    assert_eq!(entrant(&store, "bob").await.rank_range(), Some((2, 3)));
}

#[tokio::test]
async fn early_exit_skips_remaining_pages() {
    let store = store_with(&[("alice", "A")]).await;
    let feed = MockFeed::from_rows(
        &[("A", 100), ("X", 90), ("Y", 80), ("Z", 70), ("W", 60), ("V", 50)],
        2,
    );

    runner().run_once(&store, &feed).await.unwrap();
    assert_eq!(feed.fetch_count(), 1);
    assert_eq!(entrant(&store, "alice").await.rank_range(), Some((1, 1)));
}

#[tokio::test]
async fn absent_member_keeps_stale_data() {
    let store = store_with(&[("alice", "A")]).await;
    let mut carol = TrackedEntrant::new("carol", "C-not-on-board");
    carol.score = Some(42);
    carol.rank_lower_bound = 10;
    carol.rank_upper_bound = 11;
    store.upsert(&carol).await.unwrap();

    let feed = MockFeed::from_rows(&[("A", 100), ("X", 90)], 1);
    let report = runner().run_once(&store, &feed).await.unwrap();
    assert_eq!(report.resolved, 1);

    let carol_after = entrant(&store, "carol").await;
    assert_eq!(carol_after.score, Some(42));
    assert_eq!(carol_after.rank_range(), Some((10, 11)));
}

#[tokio::test]
async fn feed_ending_mid_tie_updates_score_only() {
    let store = SqliteUserStore::in_memory().await.unwrap();
    for (member, steam) in [("alice", "A"), ("bob", "B")] {
        let mut e = TrackedEntrant::new(member, steam);
        e.score = Some(90);
        e.rank_lower_bound = 4;
        e.rank_upper_bound = 4;
        store.upsert(&e).await.unwrap();
    }
    let feed = MockFeed::from_rows(&[("A", 100), ("B", 100)], 10);

    let report = runner().run_once(&store, &feed).await.unwrap();
    assert_eq!(report.unflushed, 2);

    let alice = entrant(&store, "alice").await;
    assert_eq!(alice.score, Some(100));
    assert_eq!(alice.rank_range(), Some((4, 4)));
}

#[tokio::test]
async fn feed_ending_mid_tie_flushed_when_configured() {
    let store = store_with(&[("alice", "A"), ("bob", "B")]).await;
    let feed = MockFeed::from_rows(&[("A", 100), ("B", 100)], 10);
    let runner = SyncRunner::new(RankBucketReconciler::new(ReconcileOptions {
        flush_trailing_bucket: true,
    }));

    let report = runner.run_once(&store, &feed).await.unwrap();
    assert_eq!(report.unflushed, 0);
    assert_eq!(entrant(&store, "bob").await.rank_range(), Some((1, 2)));
}

#[tokio::test]
async fn fetch_failure_leaves_store_untouched() {
    let store = SqliteUserStore::in_memory().await.unwrap();
    let mut alice = TrackedEntrant::new("alice", "A");
    alice.score = Some(50);
    alice.rank_lower_bound = 9;
    alice.rank_upper_bound = 9;
    store.upsert(&alice).await.unwrap();
    store
        .upsert(&TrackedEntrant::new("bob", "B"))
        .await
        .unwrap();

    // Alice is resolved on page 0; the run dies on page 1 before Bob is seen.
    let feed = MockFeed::from_rows(&[("A", 100), ("X", 90), ("B", 80), ("Y", 70)], 2)
        .failing_page(1);

    let err = runner().run_once(&store, &feed).await.unwrap_err();
    assert!(matches!(err, LeaderboardError::FeedUnavailable(_)));

    let alice_after = entrant(&store, "alice").await;
    assert_eq!(alice_after.score, Some(50));
    assert_eq!(alice_after.rank_range(), Some((9, 9)));
    assert_eq!(entrant(&store, "bob").await.score, None);
}

#[tokio::test]
async fn malformed_entry_aborts_run() {
    let store = store_with(&[("alice", "A"), ("bob", "B")]).await;
    let feed = MockFeed::from_rows(&[("A", 100), ("X", 90), ("B", 80), ("Y", 70)], 2).with_raw_page(
        1,
        r#"<response><entries>
            <entry><steamid>B</steamid><score>eighty</score><rank>3</rank></entry>
        </entries></response>"#,
    );

    let err = runner().run_once(&store, &feed).await.unwrap_err();
    assert!(err.to_string().contains("non-numeric score"));
    assert_eq!(entrant(&store, "alice").await.score, None);
}

#[tokio::test]
async fn empty_store_reads_one_page() {
    let store = SqliteUserStore::in_memory().await.unwrap();
    let feed = MockFeed::from_rows(&[("A", 100), ("B", 90), ("C", 80)], 1);

    let report = runner().run_once(&store, &feed).await.unwrap();
    assert_eq!(report.tracked, 0);
    assert_eq!(feed.fetch_count(), 1);
}

#[tokio::test]
async fn repeated_runs_converge() {
    let store = store_with(&[("alice", "A"), ("bob", "B")]).await;

    let first = MockFeed::from_rows(&[("A", 100), ("B", 90), ("C", 80)], 10);
    runner().run_once(&store, &first).await.unwrap();
    assert_eq!(entrant(&store, "bob").await.rank_range(), Some((2, 2)));

    // Bob climbs into a tie with Alice.
    let second = MockFeed::from_rows(&[("B", 110), ("A", 110), ("C", 80)], 10);
    runner().run_once(&store, &second).await.unwrap();
    assert_eq!(entrant(&store, "alice").await.rank_range(), Some((1, 2)));
    assert_eq!(entrant(&store, "bob").await.score, Some(110));
}
