//! Steam community leaderboard feed.
//!
//! Steam publishes each game leaderboard as a paginated XML document sorted
//! by score, best first. Every page carries the absolute URL of the next
//! page in `<nextRequestURL>`; the last page omits it (or leaves it empty).
//!
//! Page URL: `https://steamcommunity.com/stats/{app}/leaderboards/{id}/?xml=1`
//! Auth: not required.
//!
//! ```xml
//! <response>
//!   <nextRequestURL><![CDATA[https://…&start=5001&end=10000]]></nextRequestURL>
//!   <entries>
//!     <entry><steamid>76561198…</steamid><score>1520</score><rank>1</rank></entry>
//!   </entries>
//! </response>
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;
use tracing::debug;

use super::FeedFetcher;
use crate::config::FeedConfig;
use crate::types::{FeedEntry, FeedPage, LeaderboardError, LeaderboardResult};

const FEED_NAME: &str = "steam-leaderboard";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Fetches leaderboard pages over HTTP.
pub struct SteamLeaderboardClient {
    http: Client,
    first_page_url: String,
}

impl SteamLeaderboardClient {
    pub fn new(cfg: &FeedConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .user_agent(cfg.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client for Steam leaderboard")?;

        Ok(Self {
            http,
            first_page_url: cfg.leaderboard_url.clone(),
        })
    }

    async fn fetch_xml(&self, url: &str) -> LeaderboardResult<String> {
        debug!(url = %url, "Fetching leaderboard page");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| feed_error(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(feed_error(format!(
                "leaderboard returned {status}: {}",
                truncate(&body, 200)
            )));
        }

        resp.text()
            .await
            .map_err(|e| feed_error(format!("failed to read response body: {e}")))
    }
}

#[async_trait]
impl FeedFetcher for SteamLeaderboardClient {
    async fn fetch_page(&self, token: Option<&str>) -> LeaderboardResult<FeedPage> {
        // The token is the absolute next-page URL Steam handed us.
        let url = token.unwrap_or(&self.first_page_url);
        let xml = self.fetch_xml(url).await?;
        let page = parse_leaderboard_page(&xml)?;

        debug!(
            entries = page.entries.len(),
            first_rank = page.entries.first().map(|e| e.rank),
            last_rank = page.entries.last().map(|e| e.rank),
            has_more = page.next_token.is_some(),
            "Leaderboard page parsed"
        );

        Ok(page)
    }

    fn name(&self) -> &str {
        FEED_NAME
    }
}

// ---------------------------------------------------------------------------
// XML parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RawEntry {
    steam_id: Option<String>,
    score: Option<String>,
    rank: Option<String>,
}

impl RawEntry {
    fn set(&mut self, field: &str, value: String) {
        match field {
            "steamid" => self.steam_id = Some(value),
            "score" => self.score = Some(value),
            "rank" => self.rank = Some(value),
            _ => {}
        }
    }

    /// `position` is 1-based within the page and only used in messages.
    fn into_entry(self, position: usize) -> LeaderboardResult<FeedEntry> {
        let steam_id = self
            .steam_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| feed_error(format!("entry {position} has no steamid")))?;

        let score = parse_int(self.score.as_deref(), "score", position)?;
        let rank = parse_int(self.rank.as_deref(), "rank", position)?;
        if rank < 1 {
            return Err(feed_error(format!("entry {position} has invalid rank {rank}")));
        }

        Ok(FeedEntry {
            steam_id,
            score,
            rank,
        })
    }
}

fn parse_int(value: Option<&str>, field: &str, position: usize) -> LeaderboardResult<i64> {
    let raw = value.ok_or_else(|| feed_error(format!("entry {position} has no {field}")))?;
    raw.parse::<i64>()
        .map_err(|_| feed_error(format!("entry {position} has non-numeric {field}: {raw:?}")))
}

/// Parse one leaderboard page.
///
/// Every `<entry>` must carry a steam id and numeric score and rank: a
/// single bad entry rejects the whole page, since rank bucketing depends on
/// seeing every entry in sequence.
pub fn parse_leaderboard_page(xml: &str) -> LeaderboardResult<FeedPage> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut saw_root = false;
    let mut next_url: Option<String> = None;
    let mut reported_error: Option<String> = None;
    let mut current: Option<RawEntry> = None;
    let mut entries = Vec::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                if path.is_empty() {
                    check_root(&name)?;
                    saw_root = true;
                }
                if name == "entry" && in_entries(&path) {
                    current = Some(RawEntry::default());
                }
                path.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().into_inner()).to_string();
                if path.is_empty() {
                    check_root(&name)?;
                    saw_root = true;
                }
                if name == "entry" && in_entries(&path) {
                    return Err(feed_error(format!(
                        "entry {} is empty",
                        entries.len() + 1
                    )));
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| feed_error(format!("invalid text content: {err}")))?
                    .trim()
                    .to_string();
                collect_text(&path, text, &mut current, &mut next_url, &mut reported_error);
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e).trim().to_string();
                collect_text(&path, text, &mut current, &mut next_url, &mut reported_error);
            }
            Ok(Event::End(_)) => {
                if let Some(name) = path.pop() {
                    if name == "entry" && in_entries(&path) {
                        if let Some(raw) = current.take() {
                            entries.push(raw.into_entry(entries.len() + 1)?);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(feed_error(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(feed_error("empty leaderboard payload".to_string()));
    }
    if !path.is_empty() {
        return Err(feed_error(format!(
            "truncated leaderboard payload inside <{}>",
            path.join("/")
        )));
    }
    if let Some(message) = reported_error {
        return Err(feed_error(format!("leaderboard reported an error: {message}")));
    }

    Ok(FeedPage {
        entries,
        next_token: next_url.filter(|u| !u.is_empty()),
    })
}

fn check_root(name: &str) -> LeaderboardResult<()> {
    if name == "response" {
        Ok(())
    } else {
        Err(feed_error(format!("unexpected root element <{name}>")))
    }
}

/// Whether `path` points at `<response><entries>`.
fn in_entries(path: &[String]) -> bool {
    path.len() == 2 && path[1] == "entries"
}

fn collect_text(
    path: &[String],
    text: String,
    current: &mut Option<RawEntry>,
    next_url: &mut Option<String>,
    reported_error: &mut Option<String>,
) {
    match path {
        [_, field] if field == "nextRequestURL" => *next_url = Some(text),
        [_, field] if field == "error" => *reported_error = Some(text),
        [_, entries, entry, field] if entries == "entries" && entry == "entry" => {
            if let Some(raw) = current.as_mut() {
                raw.set(field, text);
            }
        }
        _ => {}
    }
}

fn feed_error(message: String) -> LeaderboardError {
    LeaderboardError::FeedUnavailable(message)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
