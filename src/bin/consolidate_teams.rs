use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_sync::config::Config;
use atlas_sync::db::Store;
use atlas_sync::matching::{consolidate, ConsolidationPlan};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consolidate_teams=info,atlas_sync=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let store = Store::new(&config.database_url).await?;

    let before = store.team_count().await?;

    for plan in ConsolidationPlan::defaults() {
        let report = consolidate(&store, &plan).await?;

        if report.canonical_id.is_none() {
            continue;
        }
        info!(
            "{}: {} players moved, {} duplicates deleted",
            report.canonical,
            report.reassigned_players,
            report.deleted.len()
        );
        if !report.retained.is_empty() {
            warn!(
                "{}: duplicates {:?} are still referenced and were kept",
                report.canonical, report.retained
            );
        }
    }

    info!(
        "Done: {} teams before, {} after",
        before,
        store.team_count().await?
    );

    Ok(())
}
