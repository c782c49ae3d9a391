use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SourceError;

const API_FOOTBALL_HOST: &str = "v3.football.api-sports.io";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RATE_LIMIT_DELAY: Duration = Duration::from_secs(60);
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Which fixtures to request from `/fixtures`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureQuery {
    /// Next `next` fixtures of a team
    TeamNext { team: i64, next: u32 },
    /// Last `last` fixtures of a team in a season
    TeamLast { team: i64, season: i32, last: u32 },
    /// League fixtures between two dates (YYYY-MM-DD)
    LeagueWindow {
        league: i64,
        season: i32,
        from: String,
        to: String,
    },
    /// Every fixture on a date (YYYY-MM-DD)
    Date(String),
    /// Fixtures in play right now
    Live,
}

impl FixtureQuery {
    /// Stable identifier used in checkpoints
    pub fn key(&self) -> String {
        match self {
            FixtureQuery::TeamNext { team, next } => format!("team:{}:next:{}", team, next),
            FixtureQuery::TeamLast { team, season, last } => {
                format!("team:{}:season:{}:last:{}", team, season, last)
            }
            FixtureQuery::LeagueWindow {
                league,
                season,
                from,
                to,
            } => format!("league:{}:season:{}:{}..{}", league, season, from, to),
            FixtureQuery::Date(date) => format!("date:{}", date),
            FixtureQuery::Live => "live".to_string(),
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            FixtureQuery::TeamNext { team, next } => {
                vec![("team", team.to_string()), ("next", next.to_string())]
            }
            FixtureQuery::TeamLast { team, season, last } => vec![
                ("team", team.to_string()),
                ("season", season.to_string()),
                ("last", last.to_string()),
            ],
            FixtureQuery::LeagueWindow {
                league,
                season,
                from,
                to,
            } => vec![
                ("league", league.to_string()),
                ("season", season.to_string()),
                ("from", from.clone()),
                ("to", to.clone()),
            ],
            FixtureQuery::Date(date) => vec![("date", date.clone())],
            FixtureQuery::Live => vec![("live", "all".to_string())],
        }
    }
}

/// One item of the `/fixtures` response
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub fixture: FixtureInfo,
    pub league: FixtureLeague,
    pub teams: FixtureTeams,
    pub goals: Goals,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureInfo {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub venue: Option<Venue>,
    pub status: FixtureStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Venue {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureStatus {
    /// Short status code, e.g. "NS", "1H", "FT"
    pub short: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureLeague {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureTeams {
    pub home: FixtureTeam,
    pub away: FixtureTeam,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureTeam {
    pub id: i64,
    pub name: String,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Goals {
    pub home: Option<i32>,
    pub away: Option<i32>,
}

/// One item of the `/teams` response
#[derive(Debug, Clone, Deserialize)]
pub struct TeamSearchResult {
    pub team: ApiTeam,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiTeam {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub logo: Option<String>,
}

/// Which players to request from `/players`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerQuery {
    /// Players whose name contains the text
    Search(String),
    /// Squad of a team in a season
    Squad { team: i64, season: i32 },
}

impl PlayerQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            PlayerQuery::Search(name) => vec![("search", name.clone())],
            PlayerQuery::Squad { team, season } => {
                vec![("team", team.to_string()), ("season", season.to_string())]
            }
        }
    }
}

/// One item of the `/players` response
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerRecord {
    pub player: ApiPlayer,
    #[serde(default)]
    pub statistics: Vec<PlayerStatistics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPlayer {
    pub id: i64,
    /// Display name, often abbreviated ("A. Hakimi")
    pub name: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub nationality: Option<String>,
    pub birth: Option<Birth>,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Birth {
    pub date: Option<String>,
}

/// Per-team, per-competition statistics; the first entry is the most recent
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerStatistics {
    pub team: Option<FixtureTeam>,
    pub league: Option<StatisticsLeague>,
    pub games: Option<Games>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatisticsLeague {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Games {
    /// "Goalkeeper", "Defender", "Midfielder" or "Attacker"
    pub position: Option<String>,
}

impl PlayerRecord {
    /// Most recent statistics entry for a club. National sides, whose names
    /// start with the nationality ("Morocco", "Morocco U23"), are passed over.
    pub fn club_statistics(&self, nationality: &str) -> Option<&PlayerStatistics> {
        let national = nationality.to_lowercase();
        self.statistics.iter().find(|s| {
            s.team
                .as_ref()
                .is_some_and(|t| !t.name.to_lowercase().starts_with(&national))
        })
    }

    pub fn has_nationality(&self, nationality: &str) -> bool {
        self.player
            .nationality
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(&nationality.to_lowercase()))
    }

    /// "Firstname Lastname" when both are known, else the display name
    pub fn full_name(&self) -> String {
        match (&self.player.firstname, &self.player.lastname) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => {
                format!("{} {}", first, last)
            }
            _ => self.player.name.clone(),
        }
    }

    pub fn position(&self) -> Option<&str> {
        self.statistics
            .iter()
            .filter_map(|s| s.games.as_ref()?.position.as_deref())
            .next()
    }
}

/// One team's sheet from `/fixtures/lineups`
#[derive(Debug, Clone, Deserialize)]
pub struct Lineup {
    pub team: FixtureTeam,
    #[serde(rename = "startXI", default)]
    pub start_xi: Vec<LineupEntry>,
    #[serde(default)]
    pub substitutes: Vec<LineupEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineupEntry {
    pub player: LineupPlayer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineupPlayer {
    pub id: Option<i64>,
    pub name: String,
    pub pos: Option<String>,
}

impl Lineup {
    /// Starters followed by substitutes
    pub fn players(&self) -> impl Iterator<Item = &LineupPlayer> {
        self.start_xi
            .iter()
            .chain(self.substitutes.iter())
            .map(|entry| &entry.player)
    }
}

/// Every fixture decoded on its own so a malformed item does not sink
/// the rest of the page
pub type FixtureItems = Vec<Result<Fixture, SourceError>>;

#[derive(Debug, Deserialize)]
struct Envelope {
    response: Option<Vec<Value>>,
    #[serde(default)]
    errors: Value,
}

/// Fixture, team, lineup and player lookups, implemented by the HTTP client and by fakes
#[async_trait]
pub trait FootballApi: Send + Sync {
    async fn fixtures(&self, query: &FixtureQuery) -> Result<FixtureItems, SourceError>;

    async fn search_teams(&self, name: &str) -> Result<Vec<TeamSearchResult>, SourceError>;

    async fn lineups(&self, fixture_id: i64) -> Result<Vec<Lineup>, SourceError>;

    /// Malformed items are logged and dropped
    async fn players(&self, query: &PlayerQuery) -> Result<Vec<PlayerRecord>, SourceError>;
}

/// Client for the API-Football v3 REST API
pub struct ApiFootballClient {
    client: Client,
    base_url: String,
    api_key: String,
    rate_limit_delay: Duration,
    max_rate_limit_retries: u32,
}

impl ApiFootballClient {
    /// Create a new API-Football client
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SourceError::Transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            rate_limit_delay: RATE_LIMIT_DELAY,
            max_rate_limit_retries: MAX_RATE_LIMIT_RETRIES,
        })
    }

    /// Override how long to wait after a 429 and how often to retry
    pub fn with_rate_limit(mut self, delay: Duration, max_retries: u32) -> Self {
        self.rate_limit_delay = delay;
        self.max_rate_limit_retries = max_retries;
        self
    }

    async fn get(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<Vec<Value>, SourceError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut attempt = 0;

        loop {
            debug!("Fetching from API-Football: {} {:?}", endpoint, params);

            let response = self
                .client
                .get(&url)
                .query(params)
                .header("x-apisports-key", &self.api_key)
                .header("x-rapidapi-key", &self.api_key)
                .header("x-rapidapi-host", API_FOOTBALL_HOST)
                .send()
                .await
                .map_err(|e| SourceError::from_reqwest(endpoint, e))?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                attempt += 1;
                if attempt > self.max_rate_limit_retries {
                    return Err(SourceError::RateLimited {
                        endpoint: endpoint.to_string(),
                    });
                }
                warn!(
                    "Rate limited by API-Football on {}, waiting {:?} (attempt {}/{})",
                    endpoint, self.rate_limit_delay, attempt, self.max_rate_limit_retries
                );
                tokio::time::sleep(self.rate_limit_delay).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SourceError::from_status(endpoint, status.as_u16(), body));
            }

            let text = response
                .text()
                .await
                .map_err(|e| SourceError::from_reqwest(endpoint, e))?;

            return decode_envelope(endpoint, &text);
        }
    }
}

#[async_trait]
impl FootballApi for ApiFootballClient {
    async fn fixtures(&self, query: &FixtureQuery) -> Result<FixtureItems, SourceError> {
        let items = self.get("/fixtures", &query.params()).await?;
        debug!("Received {} fixtures for {}", items.len(), query.key());

        Ok(items.into_iter().map(decode_fixture).collect())
    }

    async fn search_teams(&self, name: &str) -> Result<Vec<TeamSearchResult>, SourceError> {
        let items = self.get("/teams", &[("search", name.to_string())]).await?;

        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|e| SourceError::decode("team", e)))
            .collect()
    }

    async fn lineups(&self, fixture_id: i64) -> Result<Vec<Lineup>, SourceError> {
        let items = self
            .get("/fixtures/lineups", &[("fixture", fixture_id.to_string())])
            .await?;

        items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|e| SourceError::decode("lineup", e)))
            .collect()
    }

    async fn players(&self, query: &PlayerQuery) -> Result<Vec<PlayerRecord>, SourceError> {
        let items = self.get("/players", &query.params()).await?;
        debug!("Received {} players for {:?}", items.len(), query);

        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<PlayerRecord>(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed player: {}", e);
                    None
                }
            })
            .collect())
    }
}

fn decode_envelope(endpoint: &str, body: &str) -> Result<Vec<Value>, SourceError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| SourceError::decode(format!("{} envelope", endpoint), e))?;

    if has_errors(&envelope.errors) {
        return Err(SourceError::Api {
            endpoint: endpoint.to_string(),
            message: envelope.errors.to_string(),
        });
    }

    envelope.response.ok_or_else(|| {
        SourceError::decode(format!("{} envelope", endpoint), "missing `response` field")
    })
}

fn decode_fixture(item: Value) -> Result<Fixture, SourceError> {
    let id = item
        .pointer("/fixture/id")
        .and_then(Value::as_i64)
        .map(|id| format!("fixture {}", id))
        .unwrap_or_else(|| "fixture".to_string());

    serde_json::from_value(item).map_err(|e| SourceError::decode(id, e))
}

/// API-Football sends `[]` or `{}` when there are no errors
fn has_errors(errors: &Value) -> bool {
    match errors {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
