use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use moonwheel_core::MoonwheelConfig;
use moonwheel_discord::{DiscordAdapter, DiscordChatClient};
use moonwheel_notify::{ChatClient, Composer, DispatchGateway};
use moonwheel_onboarding::OnboardingManager;
use moonwheel_prefs::{ContentPool, MarkerStore, PreferenceStore};
use moonwheel_scheduler::{LoopKind, SchedulerEngine};

mod app;
mod log_mirror;

#[derive(Parser)]
#[command(name = "moonwheel-bot")]
#[command(about = "Seasonal and lunar reminder bot for Discord communities")]
#[command(version, long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("MOONWHEEL_GIT_SHA"), ")"))]
struct Cli {
    /// Path to configuration file (falls back to MOONWHEEL_CONFIG, then
    /// ~/.moonwheel/moonwheel.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Validate configuration and open the database, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // WARN+ lines queue up until the log channel is known from config
    let (mirror, mirror_queue) = log_mirror::layer(log_mirror::QUEUE_CAPACITY);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moonwheel=info,moonwheel_scheduler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(mirror)
        .init();

    let cli = Cli::parse();

    // load config: --config > MOONWHEEL_CONFIG env > ~/.moonwheel/moonwheel.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("MOONWHEEL_CONFIG").ok());
    let config = MoonwheelConfig::load(config_path.as_deref()).context("invalid configuration")?;
    let catalog = Arc::new(config.region_catalog()?);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("MOONWHEEL_GIT_SHA"),
        regions = catalog.len(),
        "configuration loaded"
    );

    // one SQLite file shared by preferences, content pools and delivery markers
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    let db = moonwheel_prefs::db::open_shared(conn)?;
    info!("database migrations complete");

    let store = PreferenceStore::new(Arc::clone(&db));
    let content = ContentPool::new(Arc::clone(&db));
    let markers = MarkerStore::new(Arc::clone(&db));

    let (users, subscribed) = store.count_users()?;
    let (quotes, prompts) = content.counts()?;
    info!(users, subscribed, quotes, prompts, "store ready");

    if cli.check {
        info!("configuration and database OK");
        return Ok(());
    }

    // REST-only client: scheduled deliveries keep working while the gateway reconnects
    let discord = Arc::new(DiscordChatClient::from_token(&config.discord.bot_token));
    let chat: Arc<dyn ChatClient> = discord.clone();
    let gateway = DispatchGateway::from_config(chat, &config.dispatch);
    let composer = Composer::new(content.clone());

    let onboarding = OnboardingManager::new(
        store.clone(),
        Arc::clone(&catalog),
        config.onboarding.tags.clone(),
        config.onboarding.timeout_secs,
    );

    let engine = Arc::new(SchedulerEngine::new(
        store.clone(),
        markers,
        Arc::clone(&catalog),
        composer.clone(),
        gateway.clone(),
        config.scheduler.clone(),
    ));

    let state = Arc::new(app::AppState {
        config,
        catalog,
        store,
        content,
        composer,
        gateway,
        onboarding,
        started_at: Utc::now(),
    });

    // background loops stop when the watch flips to true
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut tasks = Vec::new();
    for kind in [LoopKind::DailyDigest, LoopKind::EventAlert] {
        tasks.push(tokio::spawn(
            Arc::clone(&engine).run(kind, shutdown_rx.clone()),
        ));
    }
    tasks.push(tokio::spawn(app::purge_onboarding(
        Arc::clone(&state),
        shutdown_rx.clone(),
    )));
    match state.config.discord.log_channel_id.filter(|id| *id != 0) {
        Some(channel_id) => {
            let sink = Arc::new(log_mirror::ChannelSink {
                client: discord,
                channel_id,
            });
            tasks.push(tokio::spawn(log_mirror::forward(mirror_queue, sink, shutdown_rx)));
            info!(channel_id, "mirroring warnings to log channel");
        }
        None => drop(mirror_queue),
    }

    let adapter = DiscordAdapter::new(&state.config.discord, Arc::clone(&state))?;
    info!("Moonwheel started");

    tokio::select! {
        _ = adapter.run() => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
            } else {
                info!("shutdown requested");
            }
        }
    }

    // signal loops to stop and let in-flight ticks finish
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    info!("Moonwheel stopped");
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "failed to create database directory");
        }
    }
}
