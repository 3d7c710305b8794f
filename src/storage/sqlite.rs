//! SQLite-backed `UserStore`.

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::UserStore;
use crate::types::{CardColor, LeaderboardError, LeaderboardResult, PlayerCard, TrackedEntrant};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tracked_entrants (
    member_id              TEXT PRIMARY KEY,
    steam_id               TEXT NOT NULL UNIQUE,
    avatar_url             TEXT NOT NULL DEFAULT '',
    guilds                 TEXT NOT NULL DEFAULT '[]',
    score                  INTEGER,
    rank_lower_bound       INTEGER NOT NULL DEFAULT 0,
    rank_upper_bound       INTEGER NOT NULL DEFAULT 0,
    registered_at          INTEGER NOT NULL,
    wants_nickname_updates INTEGER NOT NULL DEFAULT 0,
    card_primary           TEXT NOT NULL,
    card_secondary         TEXT NOT NULL
)
"#;

const SELECT_COLUMNS: &str = "SELECT member_id, steam_id, avatar_url, guilds, score, \
     rank_lower_bound, rank_upper_bound, registered_at, wants_nickname_updates, \
     card_primary, card_secondary FROM tracked_entrants";

const UPSERT: &str = r#"
INSERT INTO tracked_entrants (
    member_id, steam_id, avatar_url, guilds, score,
    rank_lower_bound, rank_upper_bound, registered_at,
    wants_nickname_updates, card_primary, card_secondary
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
ON CONFLICT(member_id) DO UPDATE SET
    steam_id = excluded.steam_id,
    avatar_url = excluded.avatar_url,
    guilds = excluded.guilds,
    score = excluded.score,
    rank_lower_bound = excluded.rank_lower_bound,
    rank_upper_bound = excluded.rank_upper_bound,
    registered_at = excluded.registered_at,
    wants_nickname_updates = excluded.wants_nickname_updates,
    card_primary = excluded.card_primary,
    card_secondary = excluded.card_secondary
"#;

pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Open (creating if needed) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> LeaderboardResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(database_url, "User store ready");
        Ok(store)
    }

    /// Private in-memory database, mainly for tests.
    pub async fn in_memory() -> LeaderboardResult<Self> {
        // Every connection to `sqlite::memory:` is its own database, so pin
        // the pool to a single connection that never gets recycled.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> LeaderboardResult<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn entrant_from_row(row: &SqliteRow) -> LeaderboardResult<TrackedEntrant> {
    let member_id: String = row.try_get("member_id")?;

    let guilds_json: String = row.try_get("guilds")?;
    let guilds: Vec<String> = serde_json::from_str(&guilds_json).map_err(|e| {
        LeaderboardError::Store(format!("bad guilds column for {member_id}: {e}"))
    })?;

    let registered_secs: i64 = row.try_get("registered_at")?;
    let registered_at = DateTime::from_timestamp(registered_secs, 0).ok_or_else(|| {
        LeaderboardError::Store(format!(
            "bad registered_at for {member_id}: {registered_secs}"
        ))
    })?;

    let color = |column: &str| -> LeaderboardResult<CardColor> {
        let raw: String = row.try_get(column)?;
        raw.parse::<CardColor>()
            .map_err(|e| LeaderboardError::Store(format!("bad {column} for {member_id}: {e}")))
    };
    let card = PlayerCard {
        primary: color("card_primary")?,
        secondary: color("card_secondary")?,
    };

    Ok(TrackedEntrant {
        steam_id: row.try_get("steam_id")?,
        avatar_url: row.try_get("avatar_url")?,
        guilds,
        score: row.try_get("score")?,
        rank_lower_bound: row.try_get("rank_lower_bound")?,
        rank_upper_bound: row.try_get("rank_upper_bound")?,
        registered_at,
        wants_nickname_updates: row.try_get("wants_nickname_updates")?,
        card,
        member_id,
    })
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn fetch_all(&self) -> LeaderboardResult<Vec<TrackedEntrant>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY member_id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(entrant_from_row).collect()
    }

    async fn get(&self, member_id: &str) -> LeaderboardResult<Option<TrackedEntrant>> {
        let sql = format!("{SELECT_COLUMNS} WHERE member_id = ?1");
        let row = sqlx::query(&sql)
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(entrant_from_row).transpose()
    }

    async fn upsert(&self, entrant: &TrackedEntrant) -> LeaderboardResult<()> {
        let guilds = serde_json::to_string(&entrant.guilds)
            .map_err(|e| LeaderboardError::Store(format!("failed to encode guilds: {e}")))?;

        sqlx::query(UPSERT)
            .bind(&entrant.member_id)
            .bind(&entrant.steam_id)
            .bind(&entrant.avatar_url)
            .bind(guilds)
            .bind(entrant.score)
            .bind(entrant.rank_lower_bound)
            .bind(entrant.rank_upper_bound)
            .bind(entrant.registered_at.timestamp())
            .bind(entrant.wants_nickname_updates)
            .bind(entrant.card.primary.as_str())
            .bind(entrant.card.secondary.as_str())
            .execute(&self.pool)
            .await?;

        debug!(member_id = %entrant.member_id, score = ?entrant.score, "Entrant upserted");
        Ok(())
    }

    async fn remove(&self, member_id: &str) -> LeaderboardResult<bool> {
        let result = sqlx::query("DELETE FROM tracked_entrants WHERE member_id = ?1")
            .bind(member_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
