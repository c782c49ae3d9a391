use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS leagues (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        short_name TEXT NOT NULL,
        country TEXT,
        logo TEXT,
        wikidata_id TEXT UNIQUE,
        api_football_id INTEGER UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS teams (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        short_name TEXT NOT NULL,
        logo TEXT,
        league_id INTEGER REFERENCES leagues (id),
        wikidata_id TEXT UNIQUE,
        api_football_id INTEGER UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS players (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        position TEXT,
        nationality TEXT NOT NULL,
        team_id INTEGER REFERENCES teams (id),
        date_of_birth TEXT,
        image_url TEXT,
        market_value REAL,
        wikidata_id TEXT UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS matches (
        id TEXT PRIMARY KEY,
        home_team_id INTEGER NOT NULL REFERENCES teams (id),
        away_team_id INTEGER NOT NULL REFERENCES teams (id),
        league_id INTEGER REFERENCES leagues (id),
        kickoff_time TEXT NOT NULL,
        status TEXT NOT NULL,
        home_score INTEGER,
        away_score INTEGER,
        venue TEXT,
        api_football_id INTEGER UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS match_players (
        match_id TEXT NOT NULL REFERENCES matches (id),
        player_id INTEGER NOT NULL REFERENCES players (id),
        created_at TEXT NOT NULL,
        PRIMARY KEY (match_id, player_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transfers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        player_id INTEGER NOT NULL REFERENCES players (id),
        from_team_id INTEGER REFERENCES teams (id),
        to_team_id INTEGER REFERENCES teams (id),
        league_id INTEGER REFERENCES leagues (id),
        fee REAL,
        transfer_type TEXT NOT NULL,
        contract_start TEXT,
        contract_end TEXT,
        market_value REAL,
        transfer_date TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS identity_reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        candidate_name TEXT NOT NULL,
        matched_ids TEXT NOT NULL,
        resolved_id INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_players_team ON players (team_id)",
    "CREATE INDEX IF NOT EXISTS idx_players_name ON players (name)",
    "CREATE INDEX IF NOT EXISTS idx_matches_kickoff ON matches (kickoff_time)",
];

/// SQLite store for leagues, teams, players, matches and their links
pub struct Store {
    pub(crate) pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new store and initialize the database
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create data directory if needed
        if let Some(path) = database_url.strip_prefix("sqlite:") {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .context("Failed to create database directory")?;
                }
            }
        }

        // Parse connection options and enable create_if_missing
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init_schema().await?;

        info!("Store initialized");
        Ok(store)
    }

    /// Private in-memory database, used by tests
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid database URL")?
            .foreign_keys(true);

        // Every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to initialize schema")?;
        }
        Ok(())
    }
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
