use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::linker::PlayerMatchLinker;
use crate::api::football::{Fixture, FixtureQuery, FootballApi};
use crate::checkpoint::CheckpointStore;
use crate::db::Store;
use crate::matching::TeamResolver;
use crate::models::{
    api_football_match_id, ExternalId, LeagueInfo, Match, MatchStatus, MatchUpsert, SyncReport,
    TeamInfo,
};

/// Queries of a batch that already went through
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureBatchState {
    pub completed: BTreeSet<String>,
}

/// Pulls fixtures from API-Football into matches and links tracked players
pub struct FixtureIngestor {
    store: Arc<Store>,
    api: Arc<dyn FootballApi>,
    resolver: Arc<TeamResolver>,
    linker: PlayerMatchLinker,
    request_delay: Duration,
}

impl FixtureIngestor {
    pub fn new(
        store: Arc<Store>,
        api: Arc<dyn FootballApi>,
        resolver: Arc<TeamResolver>,
        linker: PlayerMatchLinker,
        request_delay: Duration,
    ) -> Self {
        Self {
            store,
            api,
            resolver,
            linker,
            request_delay,
        }
    }

    /// Pause between two API-Football requests
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Fetch one query and store every fixture it returns. A fixture that
    /// fails is recorded in the report and the rest carry on; only a failed
    /// request is an error.
    pub async fn ingest(&self, query: &FixtureQuery) -> Result<SyncReport> {
        let items = self.api.fixtures(query).await?;
        let mut report = SyncReport::default();

        for item in items {
            report.processed += 1;

            let fixture = match item {
                Ok(fixture) => fixture,
                Err(e) => {
                    warn!("Skipping fixture from {}: {}", query.key(), e);
                    report.skipped += 1;
                    report.fail(query.key(), e);
                    continue;
                }
            };

            match self.ingest_fixture(&fixture).await {
                Ok((outcome, linked)) => {
                    match outcome {
                        MatchUpsert::Inserted => report.added += 1,
                        MatchUpsert::Updated => report.updated += 1,
                    }
                    report.linked += linked;
                }
                Err(e) => {
                    error!("Failed to store fixture {}: {:#}", fixture.fixture.id, e);
                    report.skipped += 1;
                    report.fail(api_football_match_id(fixture.fixture.id), format!("{:#}", e));
                }
            }
        }

        debug!(
            "{}: {} fixtures, {} new, {} updated",
            query.key(),
            report.processed,
            report.added,
            report.updated
        );
        Ok(report)
    }

    async fn ingest_fixture(&self, fixture: &Fixture) -> Result<(MatchUpsert, usize)> {
        let league = LeagueInfo {
            name: fixture.league.name.clone(),
            external_id: Some(ExternalId::ApiFootball(fixture.league.id)),
            country: fixture.league.country.clone(),
            logo: fixture.league.logo.clone(),
        };
        let league_id = self.resolver.resolve_league(&self.store, &league).await?.id;

        let mut team_ids = [0i64; 2];
        for (slot, team) in [&fixture.teams.home, &fixture.teams.away].into_iter().enumerate() {
            let info = TeamInfo {
                name: team.name.clone(),
                external_id: Some(ExternalId::ApiFootball(team.id)),
                logo: team.logo.clone(),
                league: Some(league.clone()),
            };
            team_ids[slot] = self.resolver.resolve_team(&self.store, &info).await?.id;
        }
        let [home_team_id, away_team_id] = team_ids;

        let m = Match {
            id: api_football_match_id(fixture.fixture.id),
            home_team_id,
            away_team_id,
            league_id: Some(league_id),
            kickoff_time: fixture.fixture.date,
            status: MatchStatus::from_api_code(&fixture.fixture.status.short),
            home_score: fixture.goals.home,
            away_score: fixture.goals.away,
            venue: fixture.fixture.venue.as_ref().and_then(|v| v.name.clone()),
            api_football_id: Some(fixture.fixture.id),
        };

        let outcome = self.store.upsert_match(&m).await?;
        let linked = self
            .linker
            .link_match(&self.store, &m.id, home_team_id, away_team_id)
            .await?;

        Ok((outcome, linked))
    }

    /// Run queries in order, pausing between requests. Completed queries are
    /// checkpointed so a rerun skips them; the checkpoint is cleared once
    /// every query has gone through.
    pub async fn ingest_batch(
        &self,
        queries: &[FixtureQuery],
        checkpoint: &dyn CheckpointStore<FixtureBatchState>,
    ) -> Result<SyncReport> {
        let mut state = checkpoint.load()?;
        if !state.completed.is_empty() {
            info!(
                "Resuming fixture batch, {} of {} queries already done",
                state.completed.len(),
                queries.len()
            );
        }

        let mut report = SyncReport::default();
        let mut requested = false;

        for query in queries {
            let key = query.key();
            if state.completed.contains(&key) {
                continue;
            }

            if requested {
                tokio::time::sleep(self.request_delay).await;
            }
            requested = true;

            match self.ingest(query).await {
                Ok(query_report) => {
                    report.merge(query_report);
                    state.completed.insert(key);
                    checkpoint.save(&state)?;
                }
                Err(e) => {
                    error!("Failed to fetch fixtures for {}: {:#}", key, e);
                    report.fail(key, format!("{:#}", e));
                }
            }
        }

        let all_done = queries.iter().all(|q| state.completed.contains(&q.key()));
        if all_done {
            checkpoint.clear()?;
        } else {
            warn!("Fixture batch incomplete, checkpoint kept for the next run");
        }

        report.finished_at = Some(Utc::now());
        info!(
            "Fixture batch complete: {} fixtures, {} new, {} updated, {} players linked, {} failures",
            report.processed,
            report.added,
            report.updated,
            report.linked,
            report.failures.len()
        );
        Ok(report)
    }

    /// Refresh status and score of stored matches that are in play. Live
    /// fixtures never create matches.
    pub async fn refresh_live(&self) -> Result<SyncReport> {
        let items = self.api.fixtures(&FixtureQuery::Live).await?;
        let mut report = SyncReport::default();

        for item in items {
            report.processed += 1;

            let fixture = match item {
                Ok(fixture) => fixture,
                Err(e) => {
                    report.skipped += 1;
                    report.fail("live", e);
                    continue;
                }
            };

            let id = api_football_match_id(fixture.fixture.id);
            let status = MatchStatus::from_api_code(&fixture.fixture.status.short);

            match self
                .store
                .update_match_progress(&id, status, fixture.goals.home, fixture.goals.away)
                .await
            {
                Ok(true) => {
                    debug!(
                        "Live update {}: {} {:?}-{:?}",
                        id,
                        status.as_str(),
                        fixture.goals.home,
                        fixture.goals.away
                    );
                    report.updated += 1;
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.skipped += 1;
                    report.fail(id, format!("{:#}", e));
                }
            }
        }

        info!(
            "Live refresh: {} in play, {} tracked matches updated",
            report.processed, report.updated
        );
        Ok(report)
    }
}
