use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SourceError;

const USER_AGENT: &str = "atlas-sync/0.1 (football player reconciliation)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A player as described by one SPARQL result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikidataPlayer {
    /// Entity id, e.g. "Q1065385"
    pub wikidata_id: String,
    pub name: String,
    pub position: Option<String>,
    pub team: Option<String>,
    pub team_wikidata_id: Option<String>,
    pub league: Option<String>,
    pub league_wikidata_id: Option<String>,
    pub team_country: Option<String>,
    /// YYYY-MM-DD
    pub date_of_birth: Option<String>,
    pub image_url: Option<String>,
    /// Start of the current team membership
    pub start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<Binding>,
}

#[derive(Debug, Deserialize)]
struct BindingValue {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Binding {
    player: BindingValue,
    player_label: Option<BindingValue>,
    position_label: Option<BindingValue>,
    team_label: Option<BindingValue>,
    team: Option<BindingValue>,
    league_label: Option<BindingValue>,
    league: Option<BindingValue>,
    team_country_label: Option<BindingValue>,
    date_of_birth: Option<BindingValue>,
    image: Option<BindingValue>,
    start_time: Option<BindingValue>,
}

impl From<Binding> for WikidataPlayer {
    fn from(b: Binding) -> Self {
        let wikidata_id = entity_id(&b.player.value);
        let name = b
            .player_label
            .map(|v| v.value)
            .unwrap_or_else(|| wikidata_id.clone());

        WikidataPlayer {
            wikidata_id,
            name,
            position: b.position_label.map(|v| v.value),
            team: b.team_label.map(|v| v.value),
            team_wikidata_id: b.team.map(|v| entity_id(&v.value)),
            league: b.league_label.map(|v| v.value),
            league_wikidata_id: b.league.map(|v| entity_id(&v.value)),
            team_country: b.team_country_label.map(|v| v.value),
            date_of_birth: b.date_of_birth.map(|v| v.value.chars().take(10).collect()),
            image_url: b.image.map(|v| v.value),
            start_time: b.start_time.map(|v| v.value),
        }
    }
}

/// Paged access to players of one nationality
#[async_trait]
pub trait PlayerSource: Send + Sync {
    /// One raw page of result rows; a player may appear on several rows
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<WikidataPlayer>, SourceError>;
}

/// Client for the Wikidata SPARQL endpoint
pub struct WikidataClient {
    client: Client,
    endpoint: String,
    nationality_qid: String,
}

impl WikidataClient {
    pub fn new(endpoint: &str, nationality_qid: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(SourceError::Transport)?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            nationality_qid: nationality_qid.to_string(),
        })
    }

    /// Male football players holding the nationality, with their current
    /// clubs, born after 1980
    fn build_query(&self, offset: usize, limit: usize) -> String {
        format!(
            r#"
SELECT DISTINCT ?player ?playerLabel ?positionLabel ?teamLabel ?team ?leagueLabel ?league ?teamCountryLabel ?dateOfBirth ?image ?startTime
WHERE {{
  ?player wdt:P31 wd:Q5;
          wdt:P106 wd:Q937857;
          wdt:P27 wd:{qid};
          wdt:P21 wd:Q6581097.
  OPTIONAL {{
    ?player p:P54 ?teamStatement.
    ?teamStatement ps:P54 ?team.
    OPTIONAL {{ ?teamStatement pq:P580 ?startTime. }}
    OPTIONAL {{ ?teamStatement pq:P582 ?endTime. }}
    FILTER(!BOUND(?endTime) || ?endTime > NOW())
    OPTIONAL {{ ?team wdt:P118 ?league. }}
    OPTIONAL {{ ?team wdt:P17 ?teamCountry. }}
  }}
  OPTIONAL {{ ?player wdt:P413 ?position. }}
  OPTIONAL {{ ?player wdt:P569 ?dateOfBirth. }}
  OPTIONAL {{ ?player wdt:P18 ?image. }}
  FILTER(?dateOfBirth > "1980-01-01"^^xsd:dateTime)
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en,fr,ar". }}
}}
ORDER BY ?playerLabel DESC(?startTime)
LIMIT {limit}
OFFSET {offset}
"#,
            qid = self.nationality_qid,
            limit = limit,
            offset = offset,
        )
    }
}

#[async_trait]
impl PlayerSource for WikidataClient {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<WikidataPlayer>, SourceError> {
        let query = self.build_query(offset, limit);
        let url = format!("{}?query={}", self.endpoint, urlencoding::encode(&query));

        debug!("Querying Wikidata (offset {}, limit {})", offset, limit);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/sparql-results+json")
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::from_status(&self.endpoint, status.as_u16(), body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| SourceError::from_reqwest(&self.endpoint, e))?;

        let parsed: SparqlResponse =
            serde_json::from_str(&text).map_err(|e| SourceError::decode("SPARQL results", e))?;

        Ok(parsed
            .results
            .bindings
            .into_iter()
            .map(WikidataPlayer::from)
            .collect())
    }
}

/// Last path segment of an entity URI
fn entity_id(uri: &str) -> String {
    uri.rsplit('/').next().unwrap_or(uri).to_string()
}
