use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL
    pub database_url: String,

    /// API-Football base URL
    pub api_football_url: String,

    /// API-Football key
    pub api_football_key: String,

    /// Wikidata SPARQL endpoint
    pub wikidata_endpoint: String,

    /// Nationality used to filter players of interest
    pub tracked_nationality: String,

    /// Wikidata entity of the tracked country (Q1028 = Morocco)
    pub wikidata_nationality_qid: String,

    /// Pause between sequential requests to an external API
    pub request_delay: Duration,

    /// Interval in seconds between daemon fixture syncs
    pub fixture_sync_interval: u64,

    /// How many upcoming fixtures to pull per tracked team
    pub upcoming_fixtures: u32,

    /// Directory holding checkpoint and report files
    pub checkpoint_dir: PathBuf,

    /// Optional JSON file extending the built-in team alias table
    pub team_aliases_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let request_delay_ms: u64 = env::var("REQUEST_DELAY_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .context("REQUEST_DELAY_MS must be a valid number")?;

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/atlas.db".to_string()),

            api_football_url: env::var("API_FOOTBALL_URL")
                .unwrap_or_else(|_| "https://v3.football.api-sports.io".to_string()),

            api_football_key: env::var("API_FOOTBALL_KEY").unwrap_or_default(),

            wikidata_endpoint: env::var("WIKIDATA_ENDPOINT")
                .unwrap_or_else(|_| "https://query.wikidata.org/sparql".to_string()),

            tracked_nationality: env::var("TRACKED_NATIONALITY")
                .unwrap_or_else(|_| "Morocco".to_string()),

            wikidata_nationality_qid: env::var("WIKIDATA_NATIONALITY_QID")
                .unwrap_or_else(|_| "Q1028".to_string()),

            request_delay: Duration::from_millis(request_delay_ms),

            fixture_sync_interval: env::var("FIXTURE_SYNC_INTERVAL")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .context("FIXTURE_SYNC_INTERVAL must be a valid number")?,

            upcoming_fixtures: env::var("UPCOMING_FIXTURES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("UPCOMING_FIXTURES must be a valid number")?,

            checkpoint_dir: env::var("CHECKPOINT_DIR")
                .unwrap_or_else(|_| "data/checkpoints".to_string())
                .into(),

            team_aliases_path: env::var("TEAM_ALIASES_PATH")
                .unwrap_or_else(|_| "data/team_aliases.json".to_string())
                .into(),
        })
    }

    /// Path of a named checkpoint file inside the checkpoint directory
    pub fn checkpoint_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(format!("{}.json", name))
    }
}
