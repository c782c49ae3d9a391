use std::env;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_sync::api::{ApiFootballClient, FixtureQuery};
use atlas_sync::checkpoint::JsonFileCheckpoint;
use atlas_sync::config::Config;
use atlas_sync::db::Store;
use atlas_sync::ingest::{FixtureBatchState, FixtureIngestor, PlayerMatchLinker};
use atlas_sync::matching::TeamResolver;

const USAGE: &str = "usage: sync_fixtures --team <id>... [--next N | --season Y --last N] \
                     | --league <id> --season Y --from YYYY-MM-DD --to YYYY-MM-DD \
                     | --date YYYY-MM-DD | --live";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync_fixtures=info,atlas_sync=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let config = Config::from_env()?;
    let live = args.iter().any(|a| a == "--live");
    let queries = if live {
        Vec::new()
    } else {
        parse_queries(&args, config.upcoming_fixtures)?
    };

    let store = Arc::new(Store::new(&config.database_url).await?);
    let resolver = Arc::new(TeamResolver::load_or_default(&config.team_aliases_path)?);
    let api = Arc::new(ApiFootballClient::new(
        &config.api_football_url,
        &config.api_football_key,
    )?);

    let ingestor = FixtureIngestor::new(
        store.clone(),
        api,
        resolver,
        PlayerMatchLinker::new(&config.tracked_nationality),
        config.request_delay,
    );

    let report = if live {
        ingestor.refresh_live().await?
    } else {
        info!("Running {} fixture queries", queries.len());
        let checkpoint =
            JsonFileCheckpoint::<FixtureBatchState>::new(config.checkpoint_path("sync_fixtures"));
        ingestor.ingest_batch(&queries, &checkpoint).await?
    };

    let report_path = config.checkpoint_dir.join("sync_fixtures_report.json");
    report.write_to(&report_path)?;

    info!(
        "Done: {} new, {} updated, {} players linked, {} failures. {} matches in database",
        report.added,
        report.updated,
        report.linked,
        report.failures.len(),
        store.match_count().await?
    );

    Ok(())
}

fn parse_queries(args: &[String], default_next: u32) -> Result<Vec<FixtureQuery>> {
    let teams: Vec<i64> = values(args, "--team")
        .into_iter()
        .map(|v| v.parse().with_context(|| format!("invalid team id '{}'", v)))
        .collect::<Result<_>>()?;

    if !teams.is_empty() {
        let season: Option<i32> = parse_flag(args, "--season")?;
        let last: Option<u32> = parse_flag(args, "--last")?;
        let next: u32 = parse_flag(args, "--next")?.unwrap_or(default_next);

        return Ok(teams
            .into_iter()
            .map(|team| match (season, last) {
                (Some(season), Some(last)) => FixtureQuery::TeamLast { team, season, last },
                _ => FixtureQuery::TeamNext { team, next },
            })
            .collect());
    }

    if let Some(league) = parse_flag::<i64>(args, "--league")? {
        let season = parse_flag(args, "--season")?.context("--league needs --season")?;
        let from = flag(args, "--from").context("--league needs --from")?;
        let to = flag(args, "--to").context("--league needs --to")?;
        return Ok(vec![FixtureQuery::LeagueWindow {
            league,
            season,
            from: from.to_string(),
            to: to.to_string(),
        }]);
    }

    if let Some(date) = flag(args, "--date") {
        return Ok(vec![FixtureQuery::Date(date.to_string())]);
    }

    bail!(USAGE)
}

/// Value after the first occurrence of a flag
fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Values after every occurrence of a flag
fn values<'a>(args: &'a [String], name: &str) -> Vec<&'a str> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == name)
        .filter_map(|(i, _)| args.get(i + 1))
        .map(String::as_str)
        .collect()
}

fn parse_flag<T>(args: &[String], name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    flag(args, name)
        .map(|v| v.parse::<T>().with_context(|| format!("invalid value '{}' for {}", v, name)))
        .transpose()
}
