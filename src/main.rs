use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_sync::api::{ApiFootballClient, FootballApi};
use atlas_sync::config::Config;
use atlas_sync::db::Store;
use atlas_sync::ingest::{FixtureIngestor, PlayerMatchLinker};
use atlas_sync::matching::TeamResolver;
use atlas_sync::workers::FixtureSyncWorker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atlas_sync=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting atlas-sync");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    if config.api_football_key.is_empty() {
        warn!("API_FOOTBALL_KEY is not set, API-Football requests will be rejected");
    }

    // Initialize database
    let store = Arc::new(Store::new(&config.database_url).await?);
    info!("Database initialized");

    let resolver = Arc::new(TeamResolver::load_or_default(&config.team_aliases_path)?);
    info!("Team resolver initialized");

    let api: Arc<dyn FootballApi> = Arc::new(ApiFootballClient::new(
        &config.api_football_url,
        &config.api_football_key,
    )?);
    info!("API client initialized");

    let ingestor = FixtureIngestor::new(
        Arc::clone(&store),
        api,
        resolver,
        PlayerMatchLinker::new(&config.tracked_nationality),
        config.request_delay,
    );

    let fixture_sync = FixtureSyncWorker::new(
        store,
        ingestor,
        &config.tracked_nationality,
        config.upcoming_fixtures,
        config.fixture_sync_interval,
    );

    let sync_handle = tokio::spawn(async move {
        fixture_sync.run().await;
    });

    info!("Fixture sync worker started");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = sync_handle => {
            error!("Fixture sync exited unexpectedly: {:?}", result);
        }
    }

    info!("Shutting down atlas-sync");
    Ok(())
}
