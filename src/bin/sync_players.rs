use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_sync::api::ApiFootballClient;
use atlas_sync::checkpoint::{CheckpointStore, JsonFileCheckpoint};
use atlas_sync::config::Config;
use atlas_sync::db::Store;
use atlas_sync::matching::TeamResolver;
use atlas_sync::sync::{ApiPlayerSync, ApiPlayerSyncState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync_players=info,atlas_sync=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let restart = args.iter().any(|a| a == "--restart");
    let season = parse_season(&args)?;

    let config = Config::from_env()?;
    let store = Arc::new(Store::new(&config.database_url).await?);
    let resolver = Arc::new(TeamResolver::load_or_default(&config.team_aliases_path)?);
    let api = Arc::new(ApiFootballClient::new(
        &config.api_football_url,
        &config.api_football_key,
    )?);

    let checkpoint =
        JsonFileCheckpoint::<ApiPlayerSyncState>::new(config.checkpoint_path("sync_players"));
    if restart {
        info!("Discarding saved progress");
        checkpoint.clear()?;
    }

    match season {
        Some(season) => info!("Re-syncing {} players, squads for season {}", config.tracked_nationality, season),
        None => info!("Re-syncing {} players by name search", config.tracked_nationality),
    }

    let sync = ApiPlayerSync::new(
        store.clone(),
        api,
        resolver,
        &config.tracked_nationality,
        config.request_delay,
    )
    .with_season(season);
    let report = sync.run(&checkpoint).await?;

    let report_path = config.checkpoint_dir.join("sync_players_report.json");
    report.write_to(&report_path)?;

    info!(
        "Done: {} checked, {} added, {} moved, {} skipped. {} players in database, report at {}",
        report.processed,
        report.added,
        report.updated,
        report.skipped,
        store.player_count().await?,
        report_path.display()
    );

    Ok(())
}

/// Parse --season argument
fn parse_season(args: &[String]) -> Result<Option<i32>> {
    args.iter()
        .position(|a| a == "--season")
        .and_then(|i| args.get(i + 1))
        .map(|v| v.parse().with_context(|| format!("invalid season '{}'", v)))
        .transpose()
}
