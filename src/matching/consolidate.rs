use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use super::normalize::normalize_name;
use crate::db::Store;
use crate::models::Team;

/// Spellings of one club that ended up as separate team rows
#[derive(Debug, Clone)]
pub struct ConsolidationPlan {
    pub canonical: String,
    pub duplicates: Vec<String>,
}

impl ConsolidationPlan {
    pub fn new(canonical: &str, duplicates: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            duplicates: duplicates.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Clubs known to have been split across sources
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Al-Hilal Saudi FC", &["Al-Hilal", "al hilal", "Al Hilal FC"]),
            Self::new("Al-Ahli Jeddah", &["Al Ahli FC", "Al-Ahli"]),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationReport {
    pub canonical: String,
    pub canonical_id: Option<i64>,
    pub reassigned_players: u64,
    pub deleted: Vec<i64>,
    /// Duplicates still referenced elsewhere, players already moved
    pub retained: Vec<i64>,
}

/// Merge the duplicate rows of a plan into its canonical row
pub async fn consolidate(store: &Store, plan: &ConsolidationPlan) -> Result<ConsolidationReport> {
    let mut report = ConsolidationReport {
        canonical: plan.canonical.clone(),
        ..Default::default()
    };

    let teams = store.list_teams().await?;

    let Some(canonical) = find_canonical(&teams, &plan.canonical) else {
        warn!("Canonical team '{}' not found, skipping", plan.canonical);
        return Ok(report);
    };
    report.canonical_id = Some(canonical.id);

    let duplicate_keys: Vec<String> = plan
        .duplicates
        .iter()
        .map(|d| normalize_name(d))
        .filter(|k| !k.is_empty())
        .collect();

    let duplicates: Vec<&Team> = teams
        .iter()
        .filter(|t| t.id != canonical.id)
        .filter(|t| duplicate_keys.contains(&normalize_name(&t.name)))
        .collect();

    for duplicate in duplicates {
        let moved = store.reassign_players(duplicate.id, canonical.id).await?;
        report.reassigned_players += moved;
        info!(
            "Moved {} players from '{}' ({}) to '{}' ({})",
            moved, duplicate.name, duplicate.id, canonical.name, canonical.id
        );

        match store.delete_team(duplicate.id).await {
            Ok(()) => {
                info!("Deleted duplicate team '{}' ({})", duplicate.name, duplicate.id);
                report.deleted.push(duplicate.id);
            }
            Err(e) => {
                warn!(
                    "Could not delete team '{}' ({}), still referenced: {:#}",
                    duplicate.name, duplicate.id, e
                );
                report.retained.push(duplicate.id);
            }
        }
    }

    Ok(report)
}

fn find_canonical<'a>(teams: &'a [Team], canonical: &str) -> Option<&'a Team> {
    let wanted = canonical.trim().to_lowercase();
    if let Some(team) = teams.iter().find(|t| t.name.trim().to_lowercase() == wanted) {
        return Some(team);
    }

    let key = normalize_name(canonical);
    if key.is_empty() {
        return None;
    }
    let mut containing = teams.iter().filter(|t| normalize_name(&t.name).contains(&key));
    match (containing.next(), containing.next()) {
        (Some(team), None) => Some(team),
        _ => None,
    }
}
