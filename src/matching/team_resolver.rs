use std::path::Path;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use super::aliases::AliasTable;
use super::strategy::{default_strategies, MatchStrategy, Outcome};
use crate::db::{NewLeague, NewTeam, Store};
use crate::models::team::short_code;
use crate::models::{Candidate, IdentityKind, IdentityRow, LeagueInfo, TeamInfo};

const LEAGUE_SHORT_NAME_LEN: usize = 20;

/// Maps names coming from external sources onto stored team and league rows
pub struct TeamResolver {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

/// Outcome of the strategy chain over a snapshot of rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Matched row and the strategy that found it
    pub matched: Option<(i64, &'static str)>,
    /// Rows some strategy considered equally plausible
    pub ambiguous: Vec<i64>,
}

/// A resolved row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub id: i64,
    pub created: bool,
    pub strategy: &'static str,
}

impl TeamResolver {
    /// Resolver with the default strategy order and built-in aliases
    pub fn new() -> Self {
        Self::with_aliases(AliasTable::builtin())
    }

    pub fn with_aliases(aliases: AliasTable) -> Self {
        Self::with_strategies(default_strategies(aliases))
    }

    /// Resolver running exactly these strategies, in order
    pub fn with_strategies(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Load extra aliases from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Ok(Self::with_aliases(AliasTable::load_from_file(path)?))
    }

    /// Load aliases from `path` when the file exists, otherwise use the
    /// built-in table
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            info!("No team aliases file at {}, using built-in aliases", path.display());
            Ok(Self::new())
        }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the strategy chain. Rows holding a different id for the
    /// candidate's source are never considered.
    pub fn decide(&self, candidate: &Candidate, rows: &[IdentityRow]) -> Decision {
        let eligible: Vec<IdentityRow> = rows
            .iter()
            .filter(|row| row.compatible_with(candidate.external_id.as_ref()))
            .cloned()
            .collect();

        let mut ambiguous = Vec::new();

        for strategy in &self.strategies {
            match strategy.find(candidate, &eligible) {
                Outcome::Found(id) => {
                    debug!("{} matched '{}' to row {}", strategy.name(), candidate.name, id);
                    return Decision {
                        matched: Some((id, strategy.name())),
                        ambiguous,
                    };
                }
                Outcome::Ambiguous(ids) => {
                    debug!(
                        "{} found {} rows for '{}', not guessing",
                        strategy.name(),
                        ids.len(),
                        candidate.name
                    );
                    for id in ids {
                        if !ambiguous.contains(&id) {
                            ambiguous.push(id);
                        }
                    }
                }
                Outcome::NoMatch => {}
            }
        }

        Decision {
            matched: None,
            ambiguous,
        }
    }

    /// Find or create the team row for a source record
    pub async fn resolve_team(&self, store: &Store, team: &TeamInfo) -> Result<Resolution> {
        let candidate = Candidate {
            name: team.name.clone(),
            external_id: team.external_id.clone(),
        };
        if candidate.name.trim().is_empty() && candidate.external_id.is_none() {
            bail!("Team record has neither a name nor an external id");
        }

        let rows = store.identity_rows(IdentityKind::Team).await?;
        let decision = self.decide(&candidate, &rows);

        let resolution = match decision.matched {
            Some((id, strategy)) => {
                self.attach_external_id(store, IdentityKind::Team, id, &candidate)
                    .await?;
                Resolution {
                    id,
                    created: false,
                    strategy,
                }
            }
            None => {
                let league_id = match &team.league {
                    Some(league) if !league.name.trim().is_empty() => {
                        Some(self.resolve_league(store, league).await?.id)
                    }
                    _ => None,
                };

                let id = store
                    .insert_team(&NewTeam {
                        name: team.name.trim(),
                        short_name: &short_code(&team.name),
                        logo: team.logo.as_deref(),
                        league_id,
                        external_id: team.external_id.as_ref(),
                    })
                    .await?;

                info!("Created team: {} (id {})", team.name, id);
                Resolution {
                    id,
                    created: true,
                    strategy: "create",
                }
            }
        };

        self.record_ambiguity(store, IdentityKind::Team, &candidate, &decision, resolution.id)
            .await?;

        Ok(resolution)
    }

    /// Find or create the league row for a source record
    pub async fn resolve_league(&self, store: &Store, league: &LeagueInfo) -> Result<Resolution> {
        let candidate = Candidate {
            name: league.name.clone(),
            external_id: league.external_id.clone(),
        };
        if candidate.name.trim().is_empty() && candidate.external_id.is_none() {
            bail!("League record has neither a name nor an external id");
        }

        let rows = store.identity_rows(IdentityKind::League).await?;
        let decision = self.decide(&candidate, &rows);

        let resolution = match decision.matched {
            Some((id, strategy)) => {
                self.attach_external_id(store, IdentityKind::League, id, &candidate)
                    .await?;
                Resolution {
                    id,
                    created: false,
                    strategy,
                }
            }
            None => {
                let short_name: String = league.name.trim().chars().take(LEAGUE_SHORT_NAME_LEN).collect();
                let id = store
                    .insert_league(&NewLeague {
                        name: league.name.trim(),
                        short_name: &short_name,
                        country: league.country.as_deref(),
                        logo: league.logo.as_deref(),
                        external_id: league.external_id.as_ref(),
                    })
                    .await?;

                info!("Created league: {} (id {})", league.name, id);
                Resolution {
                    id,
                    created: true,
                    strategy: "create",
                }
            }
        };

        self.record_ambiguity(store, IdentityKind::League, &candidate, &decision, resolution.id)
            .await?;

        Ok(resolution)
    }

    async fn attach_external_id(
        &self,
        store: &Store,
        kind: IdentityKind,
        id: i64,
        candidate: &Candidate,
    ) -> Result<()> {
        if let Some(ext) = &candidate.external_id {
            store.record_external_id(kind, id, ext).await?;
        }
        Ok(())
    }

    async fn record_ambiguity(
        &self,
        store: &Store,
        kind: IdentityKind,
        candidate: &Candidate,
        decision: &Decision,
        resolved_id: i64,
    ) -> Result<()> {
        if decision.ambiguous.is_empty() {
            return Ok(());
        }

        warn!(
            "Ambiguous {} name '{}': rows {:?} all matched, used {}; queued for review",
            kind.as_str(),
            candidate.name,
            decision.ambiguous,
            resolved_id
        );
        store
            .insert_review(kind, &candidate.name, &decision.ambiguous, resolved_id)
            .await?;
        Ok(())
    }
}

impl Default for TeamResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::strategy::{ExactExternalId, ExactName};
    use crate::models::ExternalId;

    fn wikidata_team(name: &str, qid: &str) -> TeamInfo {
        TeamInfo {
            name: name.to_string(),
            external_id: Some(ExternalId::Wikidata(qid.to_string())),
            ..Default::default()
        }
    }

    fn api_team(name: &str, id: i64) -> TeamInfo {
        TeamInfo {
            name: name.to_string(),
            external_id: Some(ExternalId::ApiFootball(id)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_same_pair_twice_is_stable() {
        let store = Store::in_memory().await.unwrap();
        let resolver = TeamResolver::new();
        let team = api_team("Paris Saint Germain", 85);

        let first = resolver.resolve_team(&store, &team).await.unwrap();
        let second = resolver.resolve_team(&store, &team).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.strategy, "exact_external_id");
        assert_eq!(store.team_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_short_name_resolves_to_existing_club() {
        let store = Store::in_memory().await.unwrap();
        let resolver = TeamResolver::new();

        let stored = resolver
            .resolve_team(&store, &TeamInfo::new("Al-Hilal Saudi FC"))
            .await
            .unwrap();
        let resolved = resolver
            .resolve_team(&store, &TeamInfo::new("Al Hilal"))
            .await
            .unwrap();

        assert_eq!(resolved.id, stored.id);
        assert!(!resolved.created);
        assert_eq!(store.team_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_name_match_records_source_id() {
        let store = Store::in_memory().await.unwrap();
        let resolver = TeamResolver::new();

        let wd = resolver
            .resolve_team(&store, &wikidata_team("Al-Hilal Saudi FC", "Q193910"))
            .await
            .unwrap();
        let af = resolver
            .resolve_team(&store, &api_team("Al-Hilal Saudi FC", 2932))
            .await
            .unwrap();

        assert_eq!(af.id, wd.id);
        assert_eq!(af.strategy, "exact_name");
        let team = store.get_team(wd.id).await.unwrap().unwrap();
        assert_eq!(team.wikidata_id.as_deref(), Some("Q193910"));
        assert_eq!(team.api_football_id, Some(2932));
    }

    #[tokio::test]
    async fn test_rows_with_other_source_id_are_skipped() {
        let store = Store::in_memory().await.unwrap();
        let resolver = TeamResolver::new();

        let ahli_saudi = resolver
            .resolve_team(&store, &api_team("Al Ahli", 2929))
            .await
            .unwrap();
        let ahli_egypt = resolver
            .resolve_team(&store, &api_team("Al Ahli", 1029))
            .await
            .unwrap();

        assert_ne!(ahli_saudi.id, ahli_egypt.id);
        assert!(ahli_egypt.created);
    }

    #[tokio::test]
    async fn test_create_team_with_league() {
        let store = Store::in_memory().await.unwrap();
        let resolver = TeamResolver::new();

        let team = TeamInfo {
            name: "RS Berkane".to_string(),
            external_id: Some(ExternalId::Wikidata("Q2094204".to_string())),
            logo: None,
            league: Some(LeagueInfo {
                name: "Botola Pro".to_string(),
                external_id: Some(ExternalId::Wikidata("Q753941".to_string())),
                country: Some("Morocco".to_string()),
                logo: None,
            }),
        };

        let resolution = resolver.resolve_team(&store, &team).await.unwrap();
        let stored = store.get_team(resolution.id).await.unwrap().unwrap();
        let league = store.get_league(stored.league_id.unwrap()).await.unwrap().unwrap();

        assert_eq!(stored.short_name, "RSB");
        assert_eq!(league.name, "Botola Pro");
        assert_eq!(league.country.as_deref(), Some("Morocco"));

        // A second club in the same league reuses the league row
        let mut other = team.clone();
        other.name = "FUS Rabat".to_string();
        other.external_id = Some(ExternalId::Wikidata("Q1479825".to_string()));
        resolver.resolve_team(&store, &other).await.unwrap();
        assert_eq!(store.league_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_substring_is_queued_for_review() {
        let store = Store::in_memory().await.unwrap();
        let resolver = TeamResolver::new();

        let saudi = resolver
            .resolve_team(&store, &TeamInfo::new("Al Hilal Saudi FC"))
            .await
            .unwrap();
        let sudan = resolver
            .resolve_team(&store, &TeamInfo::new("Al Hilal Omdurman"))
            .await
            .unwrap();

        // Substring is ambiguous, the alias table settles on the Saudi club
        let resolved = resolver
            .resolve_team(&store, &TeamInfo::new("Al-Hilal"))
            .await
            .unwrap();
        assert_eq!(resolved.id, saudi.id);
        assert_eq!(resolved.strategy, "alias_table");

        let reviews = store.identity_reviews().await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].matched_ids, vec![saudi.id, sudan.id]);
        assert_eq!(reviews[0].resolved_id, saudi.id);
    }

    #[tokio::test]
    async fn test_rejects_empty_record() {
        let store = Store::in_memory().await.unwrap();
        let resolver = TeamResolver::new();
        assert!(resolver.resolve_team(&store, &TeamInfo::new("  ")).await.is_err());
    }

    #[test]
    fn test_custom_strategy_order() {
        let resolver =
            TeamResolver::with_strategies(vec![Box::new(ExactExternalId), Box::new(ExactName)]);
        assert_eq!(resolver.strategy_names(), vec!["exact_external_id", "exact_name"]);

        let rows = vec![IdentityRow {
            id: 1,
            name: "Al-Hilal Saudi FC".to_string(),
            short_name: None,
            wikidata_id: None,
            api_football_id: None,
        }];
        // Without the substring step a short spelling is not matched
        let decision = resolver.decide(&Candidate::new("Al Hilal"), &rows);
        assert_eq!(decision.matched, None);
        assert!(decision.ambiguous.is_empty());
    }
}
