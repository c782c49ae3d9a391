use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::football::FootballApi;
use crate::db::Store;
use crate::models::{ExternalId, IdentityKind, Source, SyncReport, Team};

/// Looks up API-Football ids for teams first seen through Wikidata
pub struct TeamMapper {
    store: Arc<Store>,
    api: Arc<dyn FootballApi>,
    request_delay: Duration,
}

impl TeamMapper {
    pub fn new(store: Arc<Store>, api: Arc<dyn FootballApi>, request_delay: Duration) -> Self {
        Self {
            store,
            api,
            request_delay,
        }
    }

    /// Search up to `limit` unmapped teams by name and record the first
    /// result's id and logo
    pub async fn map_unmapped(&self, limit: i64) -> Result<SyncReport> {
        let teams = self
            .store
            .teams_without_external_id(Source::ApiFootball, limit)
            .await?;
        info!("Mapping {} teams to API-Football", teams.len());

        let mut report = SyncReport::default();

        for (i, team) in teams.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.request_delay).await;
            }
            report.processed += 1;

            match self.map_team(team).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!("Failed to map '{}': {:#}", team.name, e);
                    report.skipped += 1;
                    report.fail(&team.name, format!("{:#}", e));
                }
            }
        }

        report.finished_at = Some(Utc::now());
        info!(
            "Team mapping complete: {} mapped, {} not mapped",
            report.updated, report.skipped
        );
        Ok(report)
    }

    async fn map_team(&self, team: &Team) -> Result<bool> {
        let results = self.api.search_teams(&team.name).await?;

        let Some(first) = results.first() else {
            debug!("No API-Football team found for '{}'", team.name);
            return Ok(false);
        };

        let ext = ExternalId::ApiFootball(first.team.id);
        if let Some(owner) = self.store.find_by_external_id(IdentityKind::Team, &ext).await? {
            warn!(
                "API-Football team {} ({}) already belongs to team {}, not mapping '{}'",
                first.team.id, first.team.name, owner, team.name
            );
            return Ok(false);
        }

        if !self
            .store
            .record_external_id(IdentityKind::Team, team.id, &ext)
            .await?
        {
            return Ok(false);
        }
        if let Some(logo) = &first.team.logo {
            self.store.set_team_logo(team.id, logo).await?;
        }

        info!("Mapped '{}' to API-Football team {} ({})", team.name, first.team.id, first.team.name);
        Ok(true)
    }
}
