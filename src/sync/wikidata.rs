use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::wikidata::{PlayerSource, WikidataPlayer};
use crate::checkpoint::CheckpointStore;
use crate::db::Store;
use crate::error::SourceError;
use crate::matching::TeamResolver;
use crate::models::{ExternalId, LeagueInfo, PlayerUpsert, Position, SyncReport, TeamInfo, UpsertOutcome};

pub const PAGE_SIZE: usize = 200;
const PAGE_DELAY: Duration = Duration::from_secs(5);

/// How timeouts from the SPARQL endpoint are retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(10),
        }
    }
}

/// Progress of a sync run, saved after every page and every player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WikidataSyncState {
    /// Next row offset to request
    pub offset: usize,
    /// Deduplicated records by entity id
    pub players: BTreeMap<String, WikidataPlayer>,
    pub fetch_complete: bool,
    /// Entity ids already written to the store
    pub upserted: BTreeSet<String>,
}

/// Imports tracked-nationality players from Wikidata
pub struct WikidataPlayerSync {
    store: Arc<Store>,
    source: Arc<dyn PlayerSource>,
    resolver: Arc<TeamResolver>,
    nationality: String,
    page_size: usize,
    page_delay: Duration,
    retry: RetryPolicy,
    force_team_update: bool,
}

impl WikidataPlayerSync {
    pub fn new(
        store: Arc<Store>,
        source: Arc<dyn PlayerSource>,
        resolver: Arc<TeamResolver>,
        nationality: &str,
    ) -> Self {
        Self {
            store,
            source,
            resolver,
            nationality: nationality.to_string(),
            page_size: PAGE_SIZE,
            page_delay: PAGE_DELAY,
            retry: RetryPolicy::default(),
            force_team_update: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the team of existing players instead of only filling it
    pub fn force_team_update(mut self, force: bool) -> Self {
        self.force_team_update = force;
        self
    }

    /// Fetch every page, then upsert each player. Resumes from the
    /// checkpoint and clears it when done.
    pub async fn run(&self, checkpoint: &dyn CheckpointStore<WikidataSyncState>) -> Result<SyncReport> {
        let mut state = checkpoint.load()?;

        if state.fetch_complete {
            info!(
                "Resuming Wikidata sync: {} players fetched, {} already stored",
                state.players.len(),
                state.upserted.len()
            );
        } else {
            if state.offset > 0 {
                info!("Resuming Wikidata fetch at offset {}", state.offset);
            }
            self.fetch_all(&mut state, checkpoint).await?;
        }

        let mut report = SyncReport::default();
        let pending: Vec<WikidataPlayer> = state
            .players
            .values()
            .filter(|p| !state.upserted.contains(&p.wikidata_id))
            .cloned()
            .collect();

        for player in pending {
            report.processed += 1;

            match self.upsert(&player).await {
                Ok(UpsertOutcome::Inserted(id)) => {
                    debug!("Added {} ({}) as {}", player.name, player.wikidata_id, id);
                    report.added += 1;
                }
                Ok(UpsertOutcome::Updated(_)) => report.updated += 1,
                Err(e) => {
                    warn!("Skipping {} ({}): {:#}", player.name, player.wikidata_id, e);
                    report.skipped += 1;
                    report.fail(&player.wikidata_id, format!("{:#}", e));
                }
            }

            state.upserted.insert(player.wikidata_id.clone());
            checkpoint.save(&state)?;
        }

        checkpoint.clear()?;
        report.finished_at = Some(Utc::now());

        info!(
            "Wikidata sync complete: {} players, {} added, {} updated, {} skipped",
            report.processed, report.added, report.updated, report.skipped
        );
        Ok(report)
    }

    async fn fetch_all(
        &self,
        state: &mut WikidataSyncState,
        checkpoint: &dyn CheckpointStore<WikidataSyncState>,
    ) -> Result<()> {
        loop {
            let page = match self.fetch_with_retry(state.offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "Wikidata fetch failed at offset {}: {}. Proceeding with {} players",
                        state.offset,
                        e,
                        state.players.len()
                    );
                    break;
                }
            };

            let rows = page.len();
            for player in page {
                merge_player(&mut state.players, player);
            }
            state.offset += rows;
            checkpoint.save(state)?;

            info!(
                "Fetched {} rows from Wikidata ({} unique players so far)",
                rows,
                state.players.len()
            );

            if rows < self.page_size {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        state.fetch_complete = true;
        checkpoint.save(state)?;
        Ok(())
    }

    async fn fetch_with_retry(&self, offset: usize) -> Result<Vec<WikidataPlayer>, SourceError> {
        let mut retries = 0;
        loop {
            match self.source.fetch_page(offset, self.page_size).await {
                Err(e) if e.is_timeout() && retries < self.retry.max_retries => {
                    retries += 1;
                    warn!(
                        "Wikidata timed out at offset {}, retry {}/{}",
                        offset, retries, self.retry.max_retries
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                result => return result,
            }
        }
    }

    async fn upsert(&self, player: &WikidataPlayer) -> Result<UpsertOutcome> {
        let team_id = match &player.team {
            Some(team) => {
                let info = TeamInfo {
                    name: team.clone(),
                    external_id: player.team_wikidata_id.clone().map(ExternalId::Wikidata),
                    logo: None,
                    league: player.league.as_ref().map(|league| LeagueInfo {
                        name: league.clone(),
                        external_id: player.league_wikidata_id.clone().map(ExternalId::Wikidata),
                        country: player.team_country.clone(),
                        logo: None,
                    }),
                };
                Some(self.resolver.resolve_team(&self.store, &info).await?.id)
            }
            None => None,
        };

        let upsert = PlayerUpsert {
            name: player.name.clone(),
            nationality: self.nationality.clone(),
            position: player.position.as_deref().map(Position::from_label),
            team_id,
            date_of_birth: player.date_of_birth.clone(),
            image_url: player.image_url.clone(),
            wikidata_id: Some(player.wikidata_id.clone()),
            force_team: self.force_team_update,
        };

        self.store.upsert_player(&upsert).await
    }
}

/// Keep one record per player: the latest membership, or any record with a
/// team over one without
fn merge_player(players: &mut BTreeMap<String, WikidataPlayer>, candidate: WikidataPlayer) {
    match players.get(&candidate.wikidata_id) {
        Some(existing) => {
            let newer = start_millis(&candidate) > start_millis(existing);
            let gains_team = existing.team.is_none() && candidate.team.is_some();
            if newer || gains_team {
                players.insert(candidate.wikidata_id.clone(), candidate);
            }
        }
        None => {
            players.insert(candidate.wikidata_id.clone(), candidate);
        }
    }
}

fn start_millis(player: &WikidataPlayer) -> i64 {
    player
        .start_time
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.timestamp_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpoint;
    use crate::db::NewTeam;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        pages: Mutex<VecDeque<Result<Vec<WikidataPlayer>, SourceError>>>,
        offsets: Mutex<Vec<usize>>,
    }

    impl FakeSource {
        fn new(pages: Vec<Result<Vec<WikidataPlayer>, SourceError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<usize> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlayerSource for FakeSource {
        async fn fetch_page(
            &self,
            offset: usize,
            _limit: usize,
        ) -> Result<Vec<WikidataPlayer>, SourceError> {
            self.offsets.lock().unwrap().push(offset);
            self.pages.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    fn timeout() -> SourceError {
        SourceError::Timeout {
            endpoint: "/sparql".to_string(),
        }
    }

    fn record(qid: &str, name: &str, team: Option<(&str, &str)>, start: Option<&str>) -> WikidataPlayer {
        WikidataPlayer {
            wikidata_id: qid.to_string(),
            name: name.to_string(),
            position: None,
            team: team.map(|(name, _)| name.to_string()),
            team_wikidata_id: team.map(|(_, qid)| qid.to_string()),
            league: None,
            league_wikidata_id: None,
            team_country: None,
            date_of_birth: None,
            image_url: None,
            start_time: start.map(str::to_string),
        }
    }

    fn sync(store: Arc<Store>, source: Arc<FakeSource>) -> WikidataPlayerSync {
        WikidataPlayerSync::new(store, source, Arc::new(TeamResolver::new()), "Morocco")
            .with_page_size(2)
            .with_page_delay(Duration::ZERO)
            .with_retry(RetryPolicy {
                max_retries: 3,
                backoff: Duration::ZERO,
            })
    }

    #[test]
    fn test_merge_prefers_latest_membership() {
        let mut players = BTreeMap::new();
        let inter = record("Q1", "Achraf Hakimi", Some(("Inter Milan", "Q631")), Some("2020-07-02T00:00:00Z"));
        let psg = record("Q1", "Achraf Hakimi", Some(("Paris Saint-Germain", "Q483020")), Some("2021-07-06T00:00:00Z"));

        merge_player(&mut players, psg.clone());
        merge_player(&mut players, inter);
        assert_eq!(players["Q1"].team.as_deref(), Some("Paris Saint-Germain"));

        let mut players = BTreeMap::new();
        merge_player(&mut players, record("Q2", "Yassine Bounou", None, None));
        merge_player(&mut players, record("Q2", "Yassine Bounou", Some(("Al-Hilal", "Q193910")), None));
        assert_eq!(players["Q2"].team.as_deref(), Some("Al-Hilal"));
    }

    #[tokio::test]
    async fn test_sync_dedupes_and_stores_players() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let mut hakimi = record("Q1", "Achraf Hakimi", Some(("Paris Saint-Germain", "Q483020")), Some("2021-07-06T00:00:00Z"));
        hakimi.position = Some("right-back".to_string());
        hakimi.date_of_birth = Some("1998-11-04".to_string());
        let old_club = record("Q1", "Achraf Hakimi", Some(("Inter Milan", "Q631")), Some("2020-07-02T00:00:00Z"));

        let source = Arc::new(FakeSource::new(vec![
            Ok(vec![hakimi, old_club]),
            Ok(vec![record("Q2", "Bilal El Khannouss", None, None)]),
        ]));

        let report = sync(Arc::clone(&store), Arc::clone(&source))
            .run(&MemoryCheckpoint::<WikidataSyncState>::new())
            .await
            .unwrap();

        // Second page is short, so no empty page is requested
        assert_eq!(source.offsets(), vec![0, 2]);
        assert_eq!(report.processed, 2);
        assert_eq!(report.added, 2);
        assert_eq!(store.player_count().await.unwrap(), 2);
        assert_eq!(store.team_count().await.unwrap(), 1);

        let player = store.find_player("Achraf Hakimi", Some("Q1")).await.unwrap().unwrap();
        assert_eq!(player.position, Some(Position::RB));
        assert_eq!(player.date_of_birth.as_deref(), Some("1998-11-04"));
        let team = store.get_team(player.team_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(team.name, "Paris Saint-Germain");
        assert_eq!(team.wikidata_id.as_deref(), Some("Q483020"));

        let unattached = store.find_player("Bilal El Khannouss", None).await.unwrap().unwrap();
        assert_eq!(unattached.team_id, None);
        assert_eq!(unattached.position, Some(Position::MF));
    }

    #[tokio::test]
    async fn test_missing_team_never_clears_existing_team() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let sevilla = store
            .insert_team(&NewTeam {
                name: "Sevilla FC",
                short_name: "SEV",
                logo: None,
                league_id: None,
                external_id: None,
            })
            .await
            .unwrap();
        store
            .upsert_player(&PlayerUpsert {
                name: "Yassine Bounou".to_string(),
                nationality: "Morocco".to_string(),
                team_id: Some(sevilla),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut bounou = record("Q2", "Yassine Bounou", None, None);
        bounou.image_url = Some("https://commons/bounou.jpg".to_string());
        let source = Arc::new(FakeSource::new(vec![Ok(vec![bounou])]));

        let report = sync(Arc::clone(&store), source)
            .run(&MemoryCheckpoint::<WikidataSyncState>::new())
            .await
            .unwrap();
        assert_eq!(report.updated, 1);

        let player = store.find_player("Yassine Bounou", None).await.unwrap().unwrap();
        assert_eq!(player.team_id, Some(sevilla));
        assert_eq!(player.image_url.as_deref(), Some("https://commons/bounou.jpg"));
        assert_eq!(player.wikidata_id.as_deref(), Some("Q2"));
    }

    #[tokio::test]
    async fn test_force_team_update_moves_player() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let resolver = TeamResolver::new();
        let old = resolver
            .resolve_team(&store, &TeamInfo::new("Sevilla FC"))
            .await
            .unwrap();
        store
            .upsert_player(&PlayerUpsert {
                name: "Yassine Bounou".to_string(),
                nationality: "Morocco".to_string(),
                team_id: Some(old.id),
                ..Default::default()
            })
            .await
            .unwrap();

        let source = Arc::new(FakeSource::new(vec![Ok(vec![record(
            "Q2",
            "Yassine Bounou",
            Some(("Al-Hilal Saudi FC", "Q193910")),
            Some("2023-08-23T00:00:00Z"),
        )])]));

        sync(Arc::clone(&store), source)
            .force_team_update(true)
            .run(&MemoryCheckpoint::<WikidataSyncState>::new())
            .await
            .unwrap();

        let player = store.find_player("Yassine Bounou", None).await.unwrap().unwrap();
        let team = store.get_team(player.team_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(team.name, "Al-Hilal Saudi FC");
    }

    #[tokio::test]
    async fn test_timeouts_retried_then_proceeds() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let source = Arc::new(FakeSource::new(vec![
            Ok(vec![
                record("Q1", "Achraf Hakimi", None, None),
                record("Q2", "Yassine Bounou", None, None),
            ]),
            Err(timeout()),
            Err(timeout()),
            Err(timeout()),
            Err(timeout()),
        ]));

        let report = sync(Arc::clone(&store), Arc::clone(&source))
            .run(&MemoryCheckpoint::<WikidataSyncState>::new())
            .await
            .unwrap();

        assert_eq!(source.offsets(), vec![0, 2, 2, 2, 2]);
        assert_eq!(report.added, 2);
    }

    #[tokio::test]
    async fn test_timeout_then_success() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let source = Arc::new(FakeSource::new(vec![
            Err(timeout()),
            Ok(vec![record("Q1", "Achraf Hakimi", None, None)]),
        ]));

        let report = sync(Arc::clone(&store), Arc::clone(&source))
            .run(&MemoryCheckpoint::<WikidataSyncState>::new())
            .await
            .unwrap();

        assert_eq!(source.offsets(), vec![0, 0]);
        assert_eq!(report.added, 1);
    }

    #[tokio::test]
    async fn test_resumes_from_checkpoint() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let source = Arc::new(FakeSource::default());

        let mut state = WikidataSyncState {
            offset: 400,
            fetch_complete: true,
            ..Default::default()
        };
        for p in [
            record("Q1", "Achraf Hakimi", None, None),
            record("Q2", "Yassine Bounou", None, None),
        ] {
            state.players.insert(p.wikidata_id.clone(), p);
        }
        state.upserted.insert("Q1".to_string());

        let checkpoint = MemoryCheckpoint::<WikidataSyncState>::new();
        checkpoint.save(&state).unwrap();

        let report = sync(Arc::clone(&store), Arc::clone(&source))
            .run(&checkpoint)
            .await
            .unwrap();

        assert!(source.offsets().is_empty());
        assert_eq!(report.processed, 1);
        assert!(store.find_player("Yassine Bounou", None).await.unwrap().is_some());
        assert!(store.find_player("Achraf Hakimi", None).await.unwrap().is_none());
        assert_eq!(checkpoint.load().unwrap(), WikidataSyncState::default());
    }

    #[tokio::test]
    async fn test_interrupted_fetch_resumes_at_saved_offset() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let source = Arc::new(FakeSource::new(vec![Ok(vec![record(
            "Q2",
            "Yassine Bounou",
            None,
            None,
        )])]));

        let mut state = WikidataSyncState {
            offset: 2,
            ..Default::default()
        };
        let hakimi = record("Q1", "Achraf Hakimi", None, None);
        state.players.insert(hakimi.wikidata_id.clone(), hakimi);

        let checkpoint = MemoryCheckpoint::<WikidataSyncState>::new();
        checkpoint.save(&state).unwrap();

        let report = sync(Arc::clone(&store), Arc::clone(&source))
            .run(&checkpoint)
            .await
            .unwrap();

        assert_eq!(source.offsets(), vec![2]);
        assert_eq!(report.processed, 2);
        assert_eq!(report.added, 2);
        assert!(store.find_player("Achraf Hakimi", Some("Q1")).await.unwrap().is_some());
        assert!(store.find_player("Yassine Bounou", Some("Q2")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_gateway_timeout_from_endpoint_is_retried() {
        use crate::api::WikidataClient;
        use serde_json::json;
        use wiremock::{
            matchers::{method, path},
            Mock, MockServer, ResponseTemplate,
        };

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(504).set_body_string("Gateway Timeout"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"bindings": [{
                    "player": {"type": "uri", "value": "http://www.wikidata.org/entity/Q2739680"},
                    "playerLabel": {"type": "literal", "value": "Achraf Hakimi"}
                }]}
            })))
            .mount(&server)
            .await;

        let store = Arc::new(Store::in_memory().await.unwrap());
        let client = WikidataClient::new(&format!("{}/sparql", server.uri()), "Q1028").unwrap();
        let report = WikidataPlayerSync::new(
            Arc::clone(&store),
            Arc::new(client),
            Arc::new(TeamResolver::new()),
            "Morocco",
        )
        .with_page_delay(Duration::ZERO)
        .with_retry(RetryPolicy {
            max_retries: 3,
            backoff: Duration::ZERO,
        })
        .run(&MemoryCheckpoint::<WikidataSyncState>::new())
        .await
        .unwrap();

        assert_eq!(report.added, 1);
        assert!(store.find_player("Achraf Hakimi", Some("Q2739680")).await.unwrap().is_some());
    }
}
