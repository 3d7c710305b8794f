//! leaderboard-sync entry point.
//!
//! Loads configuration, initialises structured logging, opens the user
//! store and dispatches a subcommand. `run` keeps the leaderboard in sync
//! on a fixed interval (serving the dashboard alongside) until Ctrl+C.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use leaderboard_sync::config::{self, AppConfig};
use leaderboard_sync::dashboard::{self, routes::DashboardState};
use leaderboard_sync::engine::reconciler::{RankBucketReconciler, ReconcileOptions};
use leaderboard_sync::engine::sync::{SyncReport, SyncRunner};
use leaderboard_sync::platforms::steam_leaderboard::SteamLeaderboardClient;
use leaderboard_sync::platforms::steam_profile::SteamProfileClient;
use leaderboard_sync::storage::sqlite::SqliteUserStore;
use leaderboard_sync::storage::UserStore;
use leaderboard_sync::types::{CardColor, PlayerCard, TrackedEntrant};

#[derive(Debug, Parser)]
#[command(name = "leaderboard-sync", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "LEADERBOARD_CONFIG", default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sync on the configured interval and serve the dashboard (default).
    Run,
    /// Run a single sync pass and exit.
    Sync,
    /// Register (or update) a member by Steam profile URL.
    Track {
        member_id: String,
        profile_url: String,
        #[arg(long, default_value = "")]
        avatar_url: String,
        /// Guild ids the member shares with the bot.
        #[arg(long = "guild")]
        guilds: Vec<String>,
        #[arg(long)]
        nickname_updates: bool,
        #[arg(long, default_value = "white")]
        primary_color: CardColor,
        #[arg(long, default_value = "black")]
        secondary_color: CardColor,
    },
    /// Stop tracking a member.
    Untrack { member_id: String },
    /// Print every tracked member.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    let cfg = AppConfig::load(&cli.config)?;
    init_logging();

    let store = Arc::new(
        SqliteUserStore::connect(&cfg.storage.database_url)
            .await
            .context("Failed to open user store")?,
    );

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_service(&cfg, store).await,
        Command::Sync => {
            let feed = SteamLeaderboardClient::new(&cfg.feed)?;
            let report = sync_runner(&cfg, None)
                .run_once(store.as_ref(), &feed)
                .await
                .context("Sync run failed")?;
            log_sync_report(&report);
            if !report.is_clean() {
                anyhow::bail!("{} entrant(s) could not be persisted", report.failures.len());
            }
            Ok(())
        }
        Command::Track {
            member_id,
            profile_url,
            avatar_url,
            guilds,
            nickname_updates,
            primary_color,
            secondary_color,
        } => {
            let profiles = SteamProfileClient::new(cfg.steam_api_key()?)?;
            let steam_id = profiles.resolve_steam_id(&profile_url).await?;

            // Re-registering keeps the member's last known score and rank.
            let mut entrant = match store.get(&member_id).await? {
                Some(existing) if existing.steam_id == steam_id => existing,
                _ => TrackedEntrant::new(member_id.clone(), steam_id),
            };
            entrant.avatar_url = avatar_url;
            entrant.guilds = guilds;
            entrant.wants_nickname_updates = nickname_updates;
            entrant.card = PlayerCard {
                primary: primary_color,
                secondary: secondary_color,
            };
            store.upsert(&entrant).await?;
            info!(member_id = %entrant.member_id, steam_id = %entrant.steam_id, "Member tracked");

            // Give the new member a rank straight away.
            let feed = SteamLeaderboardClient::new(&cfg.feed)?;
            match sync_runner(&cfg, None).run_once(store.as_ref(), &feed).await {
                Ok(report) => log_sync_report(&report),
                Err(e) => warn!(error = %e, "Initial sync after registration failed"),
            }
            Ok(())
        }
        Command::Untrack { member_id } => {
            if store.remove(&member_id).await? {
                info!(member_id = %member_id, "Member removed");
            } else {
                info!(member_id = %member_id, "Member was not tracked");
            }
            Ok(())
        }
        Command::List => {
            for entrant in store.fetch_all().await? {
                println!("{entrant}");
            }
            Ok(())
        }
    }
}

/// Periodic sync loop with graceful shutdown.
async fn run_service(cfg: &AppConfig, store: Arc<SqliteUserStore>) -> Result<()> {
    info!(
        service = %cfg.service.name,
        interval_secs = cfg.service.sync_interval_secs,
        leaderboard = %cfg.feed.leaderboard_url,
        "leaderboard-sync starting up"
    );

    let feed = SteamLeaderboardClient::new(&cfg.feed)?;
    let dashboard_state = Arc::new(DashboardState::new(store.clone()));
    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(dashboard_state.clone(), cfg.dashboard.port).await?;
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let runner = sync_runner(cfg, Some(cancel_rx));

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.service.sync_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering sync loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let run = runner.run_once(store.as_ref(), &feed);
                tokio::pin!(run);
                let result = tokio::select! {
                    result = &mut run => result,
                    _ = &mut shutdown => {
                        info!("Shutdown signal received, cancelling sync run.");
                        let _ = cancel_tx.send(true);
                        if let Err(e) = run.await {
                            warn!(error = %e, "Sync run stopped");
                        }
                        break;
                    }
                };
                match result {
                    Ok(report) => {
                        log_sync_report(&report);
                        dashboard_state.record_sync(report).await;
                    }
                    Err(e) => {
                        error!(error = %e, "Sync run failed, continuing to next");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("leaderboard-sync shut down cleanly.");
    Ok(())
}

fn sync_runner(cfg: &config::AppConfig, cancel: Option<watch::Receiver<bool>>) -> SyncRunner {
    let reconciler = RankBucketReconciler::new(ReconcileOptions {
        flush_trailing_bucket: cfg.feed.flush_trailing_bucket,
    });
    let reconciler = match cancel {
        Some(rx) => reconciler.with_cancellation(rx),
        None => reconciler,
    };
    SyncRunner::new(reconciler)
}

/// Log a human-readable run summary.
fn log_sync_report(report: &SyncReport) {
    info!(
        run_id = %report.run_id,
        tracked = report.tracked,
        resolved = report.resolved,
        pages = report.pages_fetched,
        unflushed = report.unflushed,
        upserted = report.upserted,
        failed = report.failures.len(),
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "Sync report"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("leaderboard_sync=info"));

    let json_logging = std::env::var("LEADERBOARD_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
