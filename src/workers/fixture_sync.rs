use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time;
use tracing::{error, info, warn};

use crate::api::FixtureQuery;
use crate::checkpoint::MemoryCheckpoint;
use crate::db::Store;
use crate::ingest::{FixtureBatchState, FixtureIngestor};
use crate::models::SyncReport;

/// Worker that periodically pulls upcoming fixtures for every tracked team
/// and refreshes matches in play
pub struct FixtureSyncWorker {
    store: Arc<Store>,
    ingestor: FixtureIngestor,
    nationality: String,
    upcoming: u32,
    sync_interval: Duration,
}

impl FixtureSyncWorker {
    pub fn new(
        store: Arc<Store>,
        ingestor: FixtureIngestor,
        nationality: &str,
        upcoming: u32,
        sync_interval_secs: u64,
    ) -> Self {
        Self {
            store,
            ingestor,
            nationality: nationality.to_string(),
            upcoming,
            sync_interval: Duration::from_secs(sync_interval_secs),
        }
    }

    /// Run the worker loop
    pub async fn run(&self) {
        info!("Fixture sync started (interval: {:?})", self.sync_interval);

        let mut interval = time::interval(self.sync_interval);

        loop {
            // First tick completes immediately
            interval.tick().await;

            match self.sync().await {
                Ok(report) => info!(
                    "Fixture sync pass: {} fixtures, {} new, {} updated, {} players linked",
                    report.processed, report.added, report.updated, report.linked
                ),
                Err(e) => {
                    error!("Fixture sync failed: {:#}", e);
                    warn!("Will retry on next interval");
                }
            }
        }
    }

    /// One pass: upcoming fixtures of tracked teams, then live scores
    pub async fn sync(&self) -> Result<SyncReport> {
        let teams = self.store.tracked_api_teams(&self.nationality).await?;
        info!("Syncing fixtures for {} tracked teams", teams.len());

        let queries: Vec<FixtureQuery> = teams
            .iter()
            .filter_map(|t| t.api_football_id)
            .map(|team| FixtureQuery::TeamNext {
                team,
                next: self.upcoming,
            })
            .collect();

        let checkpoint = MemoryCheckpoint::<FixtureBatchState>::new();
        let mut report = self.ingestor.ingest_batch(&queries, &checkpoint).await?;

        if !queries.is_empty() {
            time::sleep(self.ingestor.request_delay()).await;
        }
        match self.ingestor.refresh_live().await {
            Ok(live) => report.merge(live),
            Err(e) => warn!("Live refresh failed: {:#}", e),
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::football::{
        FixtureItems, FootballApi, Lineup, PlayerQuery, PlayerRecord, TeamSearchResult,
    };
    use crate::db::NewTeam;
    use crate::error::SourceError;
    use crate::ingest::PlayerMatchLinker;
    use crate::matching::TeamResolver;
    use crate::models::{ExternalId, PlayerUpsert};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl RecordingApi {
        fn keys(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
        }
    }

    #[async_trait]
    impl FootballApi for RecordingApi {
        async fn fixtures(&self, query: &FixtureQuery) -> Result<FixtureItems, SourceError> {
            self.calls.lock().unwrap().push((query.key(), Instant::now()));
            Ok(Vec::new())
        }

        async fn search_teams(&self, _name: &str) -> Result<Vec<TeamSearchResult>, SourceError> {
            Ok(Vec::new())
        }

        async fn lineups(&self, _fixture_id: i64) -> Result<Vec<Lineup>, SourceError> {
            Ok(Vec::new())
        }

        async fn players(&self, _query: &PlayerQuery) -> Result<Vec<PlayerRecord>, SourceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_sync_queries_tracked_teams_then_live() {
        let store = Arc::new(Store::in_memory().await.unwrap());

        let tracked = ExternalId::ApiFootball(85);
        let psg = store
            .insert_team(&NewTeam {
                name: "Paris Saint-Germain",
                short_name: "PAR",
                logo: None,
                league_id: None,
                external_id: Some(&tracked),
            })
            .await
            .unwrap();
        let untracked = ExternalId::ApiFootball(529);
        store
            .insert_team(&NewTeam {
                name: "FC Barcelona",
                short_name: "BAR",
                logo: None,
                league_id: None,
                external_id: Some(&untracked),
            })
            .await
            .unwrap();
        store
            .upsert_player(&PlayerUpsert {
                name: "Achraf Hakimi".to_string(),
                nationality: "Morocco".to_string(),
                team_id: Some(psg),
                ..Default::default()
            })
            .await
            .unwrap();

        let api = Arc::new(RecordingApi::default());
        let ingestor = FixtureIngestor::new(
            Arc::clone(&store),
            Arc::clone(&api) as Arc<dyn FootballApi>,
            Arc::new(TeamResolver::new()),
            PlayerMatchLinker::new("Morocco"),
            Duration::from_millis(50),
        );
        let worker = FixtureSyncWorker::new(store, ingestor, "Morocco", 5, 3600);

        worker.sync().await.unwrap();

        assert_eq!(
            api.keys(),
            vec!["team:85:next:5".to_string(), "live".to_string()]
        );

        // The live request waits out the request delay
        let calls = api.calls.lock().unwrap();
        assert!(calls[1].1.duration_since(calls[0].1) >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_sync_without_tracked_teams_only_refreshes_live() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let api = Arc::new(RecordingApi::default());
        let ingestor = FixtureIngestor::new(
            Arc::clone(&store),
            Arc::clone(&api) as Arc<dyn FootballApi>,
            Arc::new(TeamResolver::new()),
            PlayerMatchLinker::new("Morocco"),
            Duration::from_millis(50),
        );
        let worker = FixtureSyncWorker::new(store, ingestor, "Morocco", 5, 3600);

        worker.sync().await.unwrap();
        assert_eq!(api.keys(), vec!["live".to_string()]);
    }
}
