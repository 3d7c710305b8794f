//! Mock leaderboard feed for integration testing.
//!
//! Serves pre-rendered Steam leaderboard XML pages from memory and runs
//! them through the real page parser, so the whole pipeline is exercised
//! with no network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use leaderboard_sync::platforms::steam_leaderboard::parse_leaderboard_page;
use leaderboard_sync::platforms::FeedFetcher;
use leaderboard_sync::types::{FeedPage, LeaderboardError, LeaderboardResult};

const BASE_URL: &str = "https://mock.example.com/stats/1/leaderboards/1/?xml=1";

/// A deterministic, in-memory leaderboard.
pub struct MockFeed {
    pages: Vec<String>,
    fetches: Arc<Mutex<usize>>,
    /// If set, this page index (0-based) fails to fetch.
    fail_page: Option<usize>,
}

impl MockFeed {
    /// Build a feed from `(steam_id, score)` rows, ranked 1.. in order and
    /// split into XML pages of `page_size`.
    pub fn from_rows(rows: &[(&str, i64)], page_size: usize) -> Self {
        let chunks: Vec<&[(&str, i64)]> = rows.chunks(page_size).collect();
        let page_count = chunks.len().max(1);

        let pages = (0..page_count)
            .map(|index| {
                let chunk = chunks.get(index).copied().unwrap_or(&[]);
                let first_rank = index * page_size + 1;
                render_page(chunk, first_rank, index + 1 < page_count, index)
            })
            .collect();

        Self {
            pages,
            fetches: Arc::new(Mutex::new(0)),
            fail_page: None,
        }
    }

    /// Replace one page's body verbatim.
    pub fn with_raw_page(mut self, index: usize, body: &str) -> Self {
        self.pages[index] = body.to_string();
        self
    }

    pub fn failing_page(mut self, index: usize) -> Self {
        self.fail_page = Some(index);
        self
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

fn render_page(rows: &[(&str, i64)], first_rank: usize, has_more: bool, index: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<response>\n");
    if has_more {
        xml.push_str(&format!(
            "<nextRequestURL><![CDATA[{BASE_URL}&page={}]]></nextRequestURL>\n",
            index + 1
        ));
    }
    xml.push_str("<entries>\n");
    for (offset, (steam_id, score)) in rows.iter().enumerate() {
        xml.push_str(&format!(
            "<entry><steamid>{steam_id}</steamid><score>{score}</score><rank>{}</rank><ugcid>-1</ugcid></entry>\n",
            first_rank + offset
        ));
    }
    xml.push_str("</entries>\n</response>\n");
    xml
}

#[async_trait]
impl FeedFetcher for MockFeed {
    async fn fetch_page(&self, token: Option<&str>) -> LeaderboardResult<FeedPage> {
        *self.fetches.lock().unwrap() += 1;

        let index = match token {
            None => 0,
            Some(url) => url
                .rsplit("&page=")
                .next()
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| LeaderboardError::FeedUnavailable(format!("unknown page {url}")))?,
        };

        if self.fail_page == Some(index) {
            return Err(LeaderboardError::FeedUnavailable("connection reset".into()));
        }

        let body = self
            .pages
            .get(index)
            .ok_or_else(|| LeaderboardError::FeedUnavailable(format!("no page {index}")))?;
        parse_leaderboard_page(body)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
