//! Shared types for the leaderboard tracker.
//!
//! These types form the data model used across all modules: the tracked
//! entrants owned by the store, the transient entries produced by the feed,
//! and the domain error enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Tracked entrant
// ---------------------------------------------------------------------------

/// A community member whose position on the feed is being tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntrant {
    /// Store key (Discord user id).
    pub member_id: String,
    /// Identity key matched against feed entries (Steam id64).
    pub steam_id: String,
    pub avatar_url: String,
    /// Communities this member shares with the bot.
    pub guilds: Vec<String>,
    /// Last known score. `None` until the entrant is first seen on the feed.
    pub score: Option<i64>,
    /// Best (smallest) rank shared by the entrant's score. 0 = never ranked.
    pub rank_lower_bound: i64,
    /// Worst (largest) rank shared by the entrant's score. 0 = never ranked.
    pub rank_upper_bound: i64,
    pub registered_at: DateTime<Utc>,
    pub wants_nickname_updates: bool,
    pub card: PlayerCard,
}

impl TrackedEntrant {
    /// A freshly registered entrant with no score and no rank.
    pub fn new(member_id: impl Into<String>, steam_id: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            steam_id: steam_id.into(),
            avatar_url: String::new(),
            guilds: Vec::new(),
            score: None,
            rank_lower_bound: 0,
            rank_upper_bound: 0,
            registered_at: Utc::now(),
            wants_nickname_updates: false,
            card: PlayerCard::default(),
        }
    }

    /// Whether the entrant has ever been assigned a rank range.
    pub fn is_ranked(&self) -> bool {
        self.rank_lower_bound > 0 && self.rank_upper_bound >= self.rank_lower_bound
    }

    /// The rank range as an inclusive pair, if ranked.
    pub fn rank_range(&self) -> Option<(i64, i64)> {
        self.is_ranked()
            .then_some((self.rank_lower_bound, self.rank_upper_bound))
    }

    /// Human-readable rank: `#4` for a unique rank, `#4-7` for a tie.
    pub fn rank_label(&self) -> String {
        match self.rank_range() {
            Some((lo, hi)) if lo == hi => format!("#{lo}"),
            Some((lo, hi)) => format!("#{lo}-{hi}"),
            None => "unranked".to_string(),
        }
    }
}

impl fmt::Display for TrackedEntrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let score = self
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} (steam {}) score {} {}",
            self.member_id,
            self.steam_id,
            score,
            self.rank_label(),
        )
    }
}

// ---------------------------------------------------------------------------
// Player card
// ---------------------------------------------------------------------------

/// Colours used when rendering the member's leaderboard row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCard {
    pub primary: CardColor,
    pub secondary: CardColor,
}

impl Default for PlayerCard {
    fn default() -> Self {
        Self {
            primary: CardColor::White,
            secondary: CardColor::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardColor {
    Red,
    Green,
    Blue,
    Yellow,
    Cyan,
    Pink,
    Orange,
    White,
    Black,
    Grey,
    Beige,
}

impl CardColor {
    pub const ALL: [CardColor; 11] = [
        CardColor::Red,
        CardColor::Green,
        CardColor::Blue,
        CardColor::Yellow,
        CardColor::Cyan,
        CardColor::Pink,
        CardColor::Orange,
        CardColor::White,
        CardColor::Black,
        CardColor::Grey,
        CardColor::Beige,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardColor::Red => "red",
            CardColor::Green => "green",
            CardColor::Blue => "blue",
            CardColor::Yellow => "yellow",
            CardColor::Cyan => "cyan",
            CardColor::Pink => "pink",
            CardColor::Orange => "orange",
            CardColor::White => "white",
            CardColor::Black => "black",
            CardColor::Grey => "grey",
            CardColor::Beige => "beige",
        }
    }
}

impl fmt::Display for CardColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardColor {
    type Err = LeaderboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let wanted = if wanted == "gray" { "grey".to_string() } else { wanted };
        CardColor::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| LeaderboardError::Config(format!("unknown card colour: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// One row of the external ranking feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub steam_id: String,
    pub score: i64,
    /// 1-based position in the globally sorted feed (not page-relative).
    pub rank: i64,
}

impl FeedEntry {
    pub fn new(steam_id: impl Into<String>, score: i64, rank: i64) -> Self {
        Self {
            steam_id: steam_id.into(),
            score,
            rank,
        }
    }
}

/// One page of the feed as returned by a fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    /// Opaque token for the following page. `None` marks the end of the feed.
    pub next_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    /// Page fetch, payload parse, or feed ordering failure. Fatal to a run.
    #[error("Feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Duplicate tracked entrant for steam id {0}")]
    DuplicateEntrant(String),

    #[error("Sync run cancelled")]
    Cancelled,

    #[error("Profile lookup failed: {0}")]
    ProfileLookup(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for LeaderboardError {
    fn from(e: sqlx::Error) -> Self {
        LeaderboardError::Store(e.to_string())
    }
}

pub type LeaderboardResult<T> = Result<T, LeaderboardError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
