use std::env;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_sync::api::WikidataClient;
use atlas_sync::checkpoint::{CheckpointStore, JsonFileCheckpoint};
use atlas_sync::config::Config;
use atlas_sync::db::Store;
use atlas_sync::matching::TeamResolver;
use atlas_sync::sync::{WikidataPlayerSync, WikidataSyncState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync_wikidata=info,atlas_sync=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let force_team = args.iter().any(|a| a == "--force-team");
    let restart = args.iter().any(|a| a == "--restart");

    let config = Config::from_env()?;
    let store = Arc::new(Store::new(&config.database_url).await?);
    let resolver = Arc::new(TeamResolver::load_or_default(&config.team_aliases_path)?);
    let source = Arc::new(WikidataClient::new(
        &config.wikidata_endpoint,
        &config.wikidata_nationality_qid,
    )?);

    let checkpoint =
        JsonFileCheckpoint::<WikidataSyncState>::new(config.checkpoint_path("sync_wikidata"));
    if restart {
        info!("Discarding saved progress");
        checkpoint.clear()?;
    }

    info!(
        "Syncing {} players from Wikidata (force team update: {})",
        config.tracked_nationality, force_team
    );

    let sync = WikidataPlayerSync::new(store.clone(), source, resolver, &config.tracked_nationality)
        .force_team_update(force_team);
    let report = sync.run(&checkpoint).await?;

    let report_path = config.checkpoint_dir.join("sync_wikidata_report.json");
    report.write_to(&report_path)?;

    info!(
        "Done: {} added, {} updated, {} skipped. {} players in database, report at {}",
        report.added,
        report.updated,
        report.skipped,
        store.player_count().await?,
        report_path.display()
    );

    Ok(())
}
