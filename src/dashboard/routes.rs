//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::error;

use crate::engine::sync::SyncReport;
use crate::storage::UserStore;
use crate::types::{CardColor, TrackedEntrant};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub store: Arc<dyn UserStore>,
    pub last_sync: RwLock<Option<SyncReport>>,
}

impl DashboardState {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            last_sync: RwLock::new(None),
        }
    }

    pub async fn record_sync(&self, report: SyncReport) {
        *self.last_sync.write().await = Some(report);
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    /// Restrict to members of this guild.
    pub guild_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub member_id: String,
    pub steam_id: String,
    pub avatar_url: String,
    pub score: Option<i64>,
    pub rank_lower_bound: Option<i64>,
    pub rank_upper_bound: Option<i64>,
    pub rank_label: String,
    pub primary_color: CardColor,
    pub secondary_color: CardColor,
}

impl From<&TrackedEntrant> for LeaderboardRow {
    fn from(e: &TrackedEntrant) -> Self {
        let range = e.rank_range();
        Self {
            member_id: e.member_id.clone(),
            steam_id: e.steam_id.clone(),
            avatar_url: e.avatar_url.clone(),
            score: e.score,
            rank_lower_bound: range.map(|(lo, _)| lo),
            rank_upper_bound: range.map(|(_, hi)| hi),
            rank_label: e.rank_label(),
            primary_color: e.card.primary,
            secondary_color: e.card.secondary,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Best rank first, unranked entrants last (highest score first among them).
fn leaderboard_order(a: &TrackedEntrant, b: &TrackedEntrant) -> Ordering {
    match (a.rank_range(), b.rank_range()) {
        (Some(ra), Some(rb)) => ra.cmp(&rb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.score.cmp(&a.score),
    }
    .then_with(|| a.member_id.cmp(&b.member_id))
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/leaderboard?guild_id=…
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    let mut entrants = match state.store.fetch_all().await {
        Ok(all) => all,
        Err(e) => {
            error!(error = %e, "Failed to load leaderboard");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "leaderboard unavailable".to_string(),
                }),
            )
                .into_response();
        }
    };

    if let Some(guild) = query.guild_id.as_deref().filter(|g| !g.is_empty()) {
        entrants.retain(|e| e.guilds.iter().any(|g| g == guild));
    }
    entrants.sort_by(leaderboard_order);

    let rows: Vec<LeaderboardRow> = entrants.iter().map(LeaderboardRow::from).collect();
    Json(rows).into_response()
}

/// GET /api/sync/last
pub async fn get_last_sync(State(state): State<AppState>) -> Response {
    match state.last_sync.read().await.as_ref() {
        Some(report) => Json(report.clone()).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
