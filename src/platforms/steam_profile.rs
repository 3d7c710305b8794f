//! Steam Web API profile lookup.
//!
//! Members register with the URL of their Steam profile. Two shapes exist:
//! - `https://steamcommunity.com/profiles/76561198000000001/` already holds the id64
//! - `https://steamcommunity.com/id/<vanity>/` must be resolved via
//!   `ISteamUser/ResolveVanityURL`
//!
//! Auth: Web API key passed as the `key` query parameter.

use anyhow::{Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use crate::types::{LeaderboardError, LeaderboardResult};

const RESOLVE_VANITY_URL: &str = "https://api.steampowered.com/ISteamUser/ResolveVanityURL/v0001/";

#[derive(Debug, Deserialize)]
struct ResolveVanityEnvelope {
    response: ResolveVanityResponse,
}

#[derive(Debug, Deserialize)]
struct ResolveVanityResponse {
    success: i32,
    #[serde(default)]
    steamid: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// What the last path segment of a profile URL refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileRef {
    /// Numeric Steam id64 taken straight from a `/profiles/` URL.
    SteamId(String),
    /// Custom profile name that needs resolving.
    Vanity(String),
}

/// Classify a profile URL (or a bare id / vanity name).
pub fn parse_profile_url(input: &str) -> LeaderboardResult<ProfileRef> {
    let trimmed = input.trim();
    let without_query = trimmed.split(['?', '#']).next().unwrap_or_default();
    let (has_scheme, path) = match without_query.split_once("://") {
        Some((_, rest)) => (true, rest),
        None => (false, without_query),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // With a scheme the first segment is the host, not a profile name.
    let min_segments = if has_scheme { 2 } else { 1 };
    if segments.len() < min_segments {
        return Err(LeaderboardError::ProfileLookup(format!(
            "no profile name in URL: {input:?}"
        )));
    }
    let last = segments[segments.len() - 1];

    let parent = segments.len().checked_sub(2).map(|i| segments[i]);
    let is_id64 = last.len() == 17 && last.bytes().all(|b| b.is_ascii_digit());

    match parent {
        Some("profiles") if is_id64 => Ok(ProfileRef::SteamId(last.to_string())),
        Some("profiles") => Err(LeaderboardError::ProfileLookup(format!(
            "not a Steam id64: {last}"
        ))),
        _ if is_id64 && segments.len() == 1 => Ok(ProfileRef::SteamId(last.to_string())),
        _ => Ok(ProfileRef::Vanity(last.to_string())),
    }
}

/// Steam Web API client used when registering members.
pub struct SteamProfileClient {
    http: Client,
    api_key: SecretString,
}

impl SteamProfileClient {
    pub fn new(api_key: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent(concat!("leaderboard-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for Steam Web API")?;

        Ok(Self { http, api_key })
    }

    /// Resolve a profile URL to a Steam id64.
    pub async fn resolve_steam_id(&self, profile_url: &str) -> LeaderboardResult<String> {
        match parse_profile_url(profile_url)? {
            ProfileRef::SteamId(id) => Ok(id),
            ProfileRef::Vanity(name) => self.resolve_vanity(&name).await,
        }
    }

    async fn resolve_vanity(&self, vanity: &str) -> LeaderboardResult<String> {
        let url = format!(
            "{RESOLVE_VANITY_URL}?key={}&vanityurl={}",
            urlencoding::encode(self.api_key.expose_secret()),
            urlencoding::encode(vanity),
        );

        debug!(vanity, "Resolving Steam vanity URL");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LeaderboardError::ProfileLookup(format!("request failed: {}", e.without_url())))?;

        if !resp.status().is_success() {
            return Err(LeaderboardError::ProfileLookup(format!(
                "Steam Web API returned {}",
                resp.status()
            )));
        }

        let envelope: ResolveVanityEnvelope = resp
            .json()
            .await
            .map_err(|e| LeaderboardError::ProfileLookup(format!("unparseable response: {}", e.without_url())))?;

        let steam_id = steam_id_from_response(vanity, envelope.response)?;
        info!(vanity, steam_id = %steam_id, "Resolved Steam vanity URL");
        Ok(steam_id)
    }
}

fn steam_id_from_response(vanity: &str, resp: ResolveVanityResponse) -> LeaderboardResult<String> {
    match (resp.success, resp.steamid) {
        (1, Some(id)) if !id.is_empty() => Ok(id),
        _ => Err(LeaderboardError::ProfileLookup(format!(
            "could not resolve {vanity:?}: {}",
            resp.message.unwrap_or_else(|| "no match".to_string())
        ))),
    }
}
