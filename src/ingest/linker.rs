use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::api::football::{FootballApi, Lineup};
use crate::db::Store;
use crate::matching::find_unique_player;
use crate::models::{Match, Player, SyncReport};

/// Associates tracked players with the matches their current teams play
pub struct PlayerMatchLinker {
    nationality: String,
}

impl PlayerMatchLinker {
    pub fn new(nationality: &str) -> Self {
        Self {
            nationality: nationality.to_string(),
        }
    }

    /// Link every tracked player of either team to the match. Returns how
    /// many links were new; existing links are left alone.
    pub async fn link_match(
        &self,
        store: &Store,
        match_id: &str,
        home_team_id: i64,
        away_team_id: i64,
    ) -> Result<usize> {
        let players = store
            .tracked_player_ids(&self.nationality, home_team_id, away_team_id)
            .await?;

        let mut linked = 0;
        for player_id in players {
            if store.link_player(match_id, player_id).await? {
                linked += 1;
            }
        }

        if linked > 0 {
            debug!("Linked {} players to match {}", linked, match_id);
        }
        Ok(linked)
    }

    /// Re-run linking across the `limit` most recent matches, picking up
    /// players who joined a team after its matches were ingested
    pub async fn link_recent(&self, store: &Store, limit: i64) -> Result<SyncReport> {
        let matches = store.recent_matches(limit).await?;
        let mut report = SyncReport::default();

        for m in &matches {
            report.processed += 1;
            match self
                .link_match(store, &m.id, m.home_team_id, m.away_team_id)
                .await
            {
                Ok(n) => report.linked += n,
                Err(e) => {
                    report.skipped += 1;
                    report.fail(&m.id, format!("{:#}", e));
                }
            }
        }

        info!(
            "Linked {} new players across {} matches",
            report.linked, report.processed
        );
        Ok(report)
    }

    /// Link tracked players named in the published lineups of the `limit`
    /// most recent API-Football matches, whatever team they are assigned to.
    /// Matches without lineups are skipped.
    pub async fn link_lineups(
        &self,
        store: &Store,
        api: &dyn FootballApi,
        limit: i64,
        request_delay: Duration,
    ) -> Result<SyncReport> {
        let matches = store.recent_api_matches(limit).await?;
        let tracked = store.tracked_players(&self.nationality).await?;
        info!(
            "Checking lineups of {} matches for {} tracked players",
            matches.len(),
            tracked.len()
        );

        let mut report = SyncReport::default();

        for (i, m) in matches.iter().enumerate() {
            let Some(fixture_id) = m.api_football_id else {
                continue;
            };
            if i > 0 {
                tokio::time::sleep(request_delay).await;
            }
            report.processed += 1;

            let lineups = match api.lineups(fixture_id).await {
                Ok(lineups) => lineups,
                Err(e) => {
                    warn!("Failed to fetch lineups for {}: {}", m.id, e);
                    report.skipped += 1;
                    report.fail(&m.id, e);
                    continue;
                }
            };
            if lineups.is_empty() {
                debug!("No lineups published for {}", m.id);
                report.skipped += 1;
                continue;
            }

            match self.link_lineup_players(store, m, &lineups, &tracked).await {
                Ok(n) => report.linked += n,
                Err(e) => {
                    report.skipped += 1;
                    report.fail(&m.id, format!("{:#}", e));
                }
            }
        }

        info!(
            "Lineup linking: {} matches checked, {} new links",
            report.processed, report.linked
        );
        Ok(report)
    }

    async fn link_lineup_players(
        &self,
        store: &Store,
        m: &Match,
        lineups: &[Lineup],
        tracked: &[Player],
    ) -> Result<usize> {
        let mut linked = 0;
        for entry in lineups.iter().flat_map(Lineup::players) {
            let Some(player) = find_unique_player(tracked, &[entry.name.as_str()]) else {
                continue;
            };
            if store.link_player(&m.id, player.id).await? {
                debug!("{} played in {} ({})", player.name, m.id, entry.name);
                linked += 1;
            }
        }
        Ok(linked)
    }
}
