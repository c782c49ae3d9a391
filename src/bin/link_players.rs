use std::env;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_sync::api::{ApiFootballClient, FootballApi};
use atlas_sync::config::Config;
use atlas_sync::db::Store;
use atlas_sync::ingest::PlayerMatchLinker;

const DEFAULT_LIMIT: i64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "link_players=info,atlas_sync=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let limit = parse_limit(&args);
    let lineups = args.iter().any(|a| a == "--lineups");

    let config = Config::from_env()?;
    let store = Store::new(&config.database_url).await?;
    let linker = PlayerMatchLinker::new(&config.tracked_nationality);

    let report = if lineups {
        info!(
            "Linking {} players from the lineups of the {} most recent matches",
            config.tracked_nationality, limit
        );
        let api: Arc<dyn FootballApi> = Arc::new(ApiFootballClient::new(
            &config.api_football_url,
            &config.api_football_key,
        )?);
        linker
            .link_lineups(&store, api.as_ref(), limit, config.request_delay)
            .await?
    } else {
        info!(
            "Linking {} players to the {} most recent matches",
            config.tracked_nationality, limit
        );
        linker.link_recent(&store, limit).await?
    };

    let report_path = config.checkpoint_dir.join("link_players_report.json");
    report.write_to(&report_path)?;

    info!(
        "Done: {} matches checked, {} new links, {} failures",
        report.processed,
        report.linked,
        report.failures.len()
    );

    Ok(())
}

/// Parse --limit argument
fn parse_limit(args: &[String]) -> i64 {
    for (i, arg) in args.iter().enumerate() {
        if arg == "--limit" || arg == "-l" {
            if let Some(value) = args.get(i + 1) {
                if let Ok(limit) = value.parse() {
                    return limit;
                }
            }
        }
    }
    DEFAULT_LIMIT
}
