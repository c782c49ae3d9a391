use std::env;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_sync::api::ApiFootballClient;
use atlas_sync::config::Config;
use atlas_sync::db::Store;
use atlas_sync::sync::TeamMapper;

const DEFAULT_LIMIT: i64 = 50;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "map_teams=info,atlas_sync=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let limit = parse_limit(&args);

    let config = Config::from_env()?;
    let store = Arc::new(Store::new(&config.database_url).await?);
    let api = Arc::new(ApiFootballClient::new(
        &config.api_football_url,
        &config.api_football_key,
    )?);

    let mapper = TeamMapper::new(store, api, config.request_delay);
    let report = mapper.map_unmapped(limit).await?;

    let report_path = config.checkpoint_dir.join("map_teams_report.json");
    report.write_to(&report_path)?;

    for failure in &report.failures {
        info!("Not mapped: {} ({})", failure.item, failure.error);
    }
    info!(
        "Done: {} of {} teams mapped, report at {}",
        report.updated,
        report.processed,
        report_path.display()
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
