//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the Steam Web API key) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub feed: FeedConfig,
    pub steam: SteamConfig,
    pub storage: StorageConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    /// Seconds between scheduled sync runs.
    pub sync_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// First page of the leaderboard feed (XML).
    pub leaderboard_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Assign rank bounds to the last tie run when the feed ends without a
    /// lower score. Off by default: those entrants keep their previous bounds.
    #[serde(default)]
    pub flush_trailing_bucket: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SteamConfig {
    /// Name of the env var holding the Steam Web API key.
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("leaderboard-sync/", env!("CARGO_PKG_VERSION")).to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        if config.service.sync_interval_secs == 0 {
            anyhow::bail!("service.sync_interval_secs must be greater than zero");
        }
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The Steam Web API key, wrapped so it never reaches logs.
    pub fn steam_api_key(&self) -> Result<SecretString> {
        Self::resolve_env(&self.steam.api_key_env).map(SecretString::new)
    }
}
