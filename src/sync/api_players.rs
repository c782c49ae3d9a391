use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::football::{FootballApi, PlayerQuery, PlayerRecord, PlayerStatistics};
use crate::checkpoint::CheckpointStore;
use crate::db::Store;
use crate::matching::{find_unique_player, same_person, TeamResolver};
use crate::models::{
    ExternalId, LeagueInfo, Player, PlayerUpsert, Position, SyncReport, Team, TeamInfo,
    UpsertOutcome,
};

/// Progress of an API-Football player sync, saved after every request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiPlayerSyncState {
    /// Stored player ids already searched
    pub searched: BTreeSet<i64>,
    pub search_complete: bool,
    /// API-Football team ids whose squads were checked
    pub squads: BTreeSet<i64>,
}

enum SearchOutcome {
    Moved(String),
    Unchanged,
    NotFound,
    NoClub,
}

/// Re-checks tracked players' clubs against API-Football.
///
/// The search pass looks every tracked player up by name and moves them to
/// the club the source reports. With a season set, a squad pass then reads
/// the squads of teams in stored matches, moving known players and adding
/// missing ones.
pub struct ApiPlayerSync {
    store: Arc<Store>,
    api: Arc<dyn FootballApi>,
    resolver: Arc<TeamResolver>,
    nationality: String,
    season: Option<i32>,
    request_delay: Duration,
}

impl ApiPlayerSync {
    pub fn new(
        store: Arc<Store>,
        api: Arc<dyn FootballApi>,
        resolver: Arc<TeamResolver>,
        nationality: &str,
        request_delay: Duration,
    ) -> Self {
        Self {
            store,
            api,
            resolver,
            nationality: nationality.to_string(),
            season: None,
            request_delay,
        }
    }

    /// Also verify squads for this season
    pub fn with_season(mut self, season: Option<i32>) -> Self {
        self.season = season;
        self
    }

    pub async fn run(&self, checkpoint: &dyn CheckpointStore<ApiPlayerSyncState>) -> Result<SyncReport> {
        let mut state = checkpoint.load()?;
        let mut report = SyncReport::default();
        let mut requested = false;

        if state.search_complete {
            info!(
                "Player search already done ({} players), skipping",
                state.searched.len()
            );
        } else {
            self.search_pass(&mut state, checkpoint, &mut report, &mut requested)
                .await?;
            state.search_complete = true;
            checkpoint.save(&state)?;
        }

        if let Some(season) = self.season {
            self.squad_pass(season, &mut state, checkpoint, &mut report, &mut requested)
                .await?;
        }

        checkpoint.clear()?;
        report.finished_at = Some(Utc::now());

        info!(
            "API-Football player sync complete: {} checked, {} added, {} moved, {} skipped",
            report.processed, report.added, report.updated, report.skipped
        );
        Ok(report)
    }

    async fn pace(&self, requested: &mut bool) {
        if *requested {
            tokio::time::sleep(self.request_delay).await;
        }
        *requested = true;
    }

    async fn search_pass(
        &self,
        state: &mut ApiPlayerSyncState,
        checkpoint: &dyn CheckpointStore<ApiPlayerSyncState>,
        report: &mut SyncReport,
        requested: &mut bool,
    ) -> Result<()> {
        let players = self.store.tracked_players(&self.nationality).await?;
        let pending: Vec<&Player> = players
            .iter()
            .filter(|p| !state.searched.contains(&p.id))
            .collect();
        info!(
            "Searching API-Football for {} of {} players",
            pending.len(),
            players.len()
        );

        for (i, player) in pending.iter().enumerate() {
            self.pace(requested).await;
            report.processed += 1;

            match self.search_player(player).await {
                Ok(SearchOutcome::Moved(club)) => {
                    info!("[{}/{}] {} moved to {}", i + 1, pending.len(), player.name, club);
                    report.updated += 1;
                }
                Ok(SearchOutcome::Unchanged) => {
                    debug!("{} already at the reported club", player.name);
                }
                Ok(SearchOutcome::NotFound) => {
                    report.skipped += 1;
                    report.fail(&player.name, "no matching API-Football player");
                }
                Ok(SearchOutcome::NoClub) => {
                    debug!("No club statistics for {}", player.name);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Search failed for {}: {:#}", player.name, e);
                    report.skipped += 1;
                    report.fail(&player.name, format!("{:#}", e));
                }
            }

            state.searched.insert(player.id);
            checkpoint.save(state)?;
        }

        Ok(())
    }

    async fn search_player(&self, player: &Player) -> Result<SearchOutcome> {
        let records = self
            .api
            .players(&PlayerQuery::Search(player.name.clone()))
            .await?;

        let Some(record) = pick_record(&records, player, &self.nationality) else {
            return Ok(SearchOutcome::NotFound);
        };
        let Some(stats) = record.club_statistics(&self.nationality) else {
            return Ok(SearchOutcome::NoClub);
        };
        let Some((team_id, club)) = self.resolve_club(stats).await? else {
            return Ok(SearchOutcome::NoClub);
        };

        if player.team_id == Some(team_id) {
            return Ok(SearchOutcome::Unchanged);
        }

        self.store
            .upsert_player(&self.upsert_for(record, &player.name, player, team_id))
            .await?;
        Ok(SearchOutcome::Moved(club))
    }

    async fn squad_pass(
        &self,
        season: i32,
        state: &mut ApiPlayerSyncState,
        checkpoint: &dyn CheckpointStore<ApiPlayerSyncState>,
        report: &mut SyncReport,
        requested: &mut bool,
    ) -> Result<()> {
        let teams = self.store.match_api_teams().await?;
        info!("Checking {} squads for season {}", teams.len(), season);

        for team in &teams {
            let Some(api_id) = team.api_football_id else {
                continue;
            };
            if state.squads.contains(&api_id) {
                continue;
            }
            self.pace(requested).await;

            if let Err(e) = self.check_squad(team, api_id, season, report).await {
                warn!("Squad check failed for {}: {:#}", team.name, e);
                report.fail(&team.name, format!("{:#}", e));
            }

            state.squads.insert(api_id);
            checkpoint.save(state)?;
        }

        Ok(())
    }

    async fn check_squad(
        &self,
        team: &Team,
        api_id: i64,
        season: i32,
        report: &mut SyncReport,
    ) -> Result<()> {
        let records = self
            .api
            .players(&PlayerQuery::Squad {
                team: api_id,
                season,
            })
            .await?;
        let tracked = self.store.tracked_players(&self.nationality).await?;

        for record in records.iter().filter(|r| r.has_nationality(&self.nationality)) {
            report.processed += 1;
            let full_name = record.full_name();
            let existing = find_unique_player(&tracked, &[full_name.as_str(), record.player.name.as_str()]);

            let upsert = match existing {
                Some(player) if player.team_id == Some(team.id) => continue,
                Some(player) => self.upsert_for(record, &player.name, player, team.id),
                None => PlayerUpsert {
                    name: full_name.clone(),
                    nationality: self.nationality.clone(),
                    position: record.position().map(Position::from_label),
                    team_id: Some(team.id),
                    date_of_birth: record.player.birth.as_ref().and_then(|b| b.date.clone()),
                    image_url: record.player.photo.clone(),
                    wikidata_id: None,
                    force_team: true,
                },
            };

            match self.store.upsert_player(&upsert).await {
                Ok(UpsertOutcome::Inserted(_)) => {
                    info!("Added {} at {}", upsert.name, team.name);
                    report.added += 1;
                }
                Ok(UpsertOutcome::Updated(_)) => {
                    info!("{} moved to {}", upsert.name, team.name);
                    report.updated += 1;
                }
                Err(e) => {
                    report.skipped += 1;
                    report.fail(&upsert.name, format!("{:#}", e));
                }
            }
        }

        Ok(())
    }

    /// Forced-team upsert that keeps the stored row's identity
    fn upsert_for(&self, record: &PlayerRecord, name: &str, player: &Player, team_id: i64) -> PlayerUpsert {
        PlayerUpsert {
            name: name.to_string(),
            nationality: self.nationality.clone(),
            position: record.position().map(Position::from_label),
            team_id: Some(team_id),
            date_of_birth: record.player.birth.as_ref().and_then(|b| b.date.clone()),
            image_url: record.player.photo.clone(),
            wikidata_id: player.wikidata_id.clone(),
            force_team: true,
        }
    }

    async fn resolve_club(&self, stats: &PlayerStatistics) -> Result<Option<(i64, String)>> {
        let Some(team) = &stats.team else {
            return Ok(None);
        };

        let league = stats.league.as_ref().and_then(|l| {
            Some(LeagueInfo {
                name: l.name.clone()?,
                external_id: l.id.map(ExternalId::ApiFootball),
                country: l.country.clone(),
                logo: l.logo.clone(),
            })
        });
        let info = TeamInfo {
            name: team.name.clone(),
            external_id: Some(ExternalId::ApiFootball(team.id)),
            logo: team.logo.clone(),
            league,
        };

        let resolution = self.resolver.resolve_team(&self.store, &info).await?;
        Ok(Some((resolution.id, team.name.clone())))
    }
}

/// The search result describing `player`: a same-nationality record whose
/// name matches, or the only same-nationality record
fn pick_record<'a>(
    records: &'a [PlayerRecord],
    player: &Player,
    nationality: &str,
) -> Option<&'a PlayerRecord> {
    let candidates: Vec<&PlayerRecord> = records
        .iter()
        .filter(|r| r.has_nationality(nationality))
        .collect();

    candidates
        .iter()
        .copied()
        .find(|r| same_person(&r.full_name(), &player.name) || same_person(&r.player.name, &player.name))
        .or(match candidates.as_slice() {
            [only] => Some(*only),
            _ => None,
        })
}
