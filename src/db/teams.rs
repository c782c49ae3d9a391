use anyhow::{Context, Result};
use tracing::debug;

use super::store::{now, Store};
use crate::models::{ExternalId, IdentityKind, IdentityRow, League, Source, Team};

/// Database row representation shared by teams and leagues
#[derive(sqlx::FromRow)]
struct IdentityRecord {
    id: i64,
    name: String,
    short_name: Option<String>,
    wikidata_id: Option<String>,
    api_football_id: Option<i64>,
}

impl From<IdentityRecord> for IdentityRow {
    fn from(row: IdentityRecord) -> Self {
        IdentityRow {
            id: row.id,
            name: row.name,
            short_name: row.short_name,
            wikidata_id: row.wikidata_id,
            api_football_id: row.api_football_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TeamRow {
    id: i64,
    name: String,
    short_name: String,
    logo: Option<String>,
    league_id: Option<i64>,
    wikidata_id: Option<String>,
    api_football_id: Option<i64>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team {
            id: row.id,
            name: row.name,
            short_name: row.short_name,
            logo: row.logo,
            league_id: row.league_id,
            wikidata_id: row.wikidata_id,
            api_football_id: row.api_football_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LeagueRow {
    id: i64,
    name: String,
    short_name: String,
    country: Option<String>,
    logo: Option<String>,
    wikidata_id: Option<String>,
    api_football_id: Option<i64>,
}

impl From<LeagueRow> for League {
    fn from(row: LeagueRow) -> Self {
        League {
            id: row.id,
            name: row.name,
            short_name: row.short_name,
            country: row.country,
            logo: row.logo,
            wikidata_id: row.wikidata_id,
            api_football_id: row.api_football_id,
        }
    }
}

/// New team row contents
#[derive(Debug, Clone)]
pub struct NewTeam<'a> {
    pub name: &'a str,
    pub short_name: &'a str,
    pub logo: Option<&'a str>,
    pub league_id: Option<i64>,
    pub external_id: Option<&'a ExternalId>,
}

/// New league row contents
#[derive(Debug, Clone)]
pub struct NewLeague<'a> {
    pub name: &'a str,
    pub short_name: &'a str,
    pub country: Option<&'a str>,
    pub logo: Option<&'a str>,
    pub external_id: Option<&'a ExternalId>,
}

const TEAM_COLUMNS: &str = "id, name, short_name, logo, league_id, wikidata_id, api_football_id";

impl Store {
    /// All identity rows of a table in ascending id order
    pub async fn identity_rows(&self, kind: IdentityKind) -> Result<Vec<IdentityRow>> {
        let sql = format!(
            "SELECT id, name, short_name, wikidata_id, api_football_id FROM {} ORDER BY id",
            kind.table()
        );

        let rows = sqlx::query_as::<_, IdentityRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch {} identities", kind.as_str()))?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Row id carrying this external id, if any
    pub async fn find_by_external_id(
        &self,
        kind: IdentityKind,
        external_id: &ExternalId,
    ) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT id FROM {} WHERE {} = ? ORDER BY id LIMIT 1",
            kind.table(),
            external_id.source().column()
        );

        let query = sqlx::query_as::<_, (i64,)>(&sql);
        let query = match external_id {
            ExternalId::Wikidata(qid) => query.bind(qid.clone()),
            ExternalId::ApiFootball(id) => query.bind(*id),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up external id")?;

        Ok(row.map(|r| r.0))
    }

    /// Record a source id on a row that has none for that source yet.
    /// Returns false when the row already carried one.
    pub async fn record_external_id(
        &self,
        kind: IdentityKind,
        id: i64,
        external_id: &ExternalId,
    ) -> Result<bool> {
        let column = external_id.source().column();
        let sql = format!(
            "UPDATE {} SET {} = ?, updated_at = ? WHERE id = ? AND {} IS NULL",
            kind.table(),
            column,
            column
        );

        let query = sqlx::query(&sql);
        let query = match external_id {
            ExternalId::Wikidata(qid) => query.bind(qid.clone()),
            ExternalId::ApiFootball(ext) => query.bind(*ext),
        };

        let result = query
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to record external id")?;

        let recorded = result.rows_affected() == 1;
        if recorded {
            debug!(
                "Recorded {} id {} on {} {}",
                external_id.source().as_str(),
                external_id.value(),
                kind.as_str(),
                id
            );
        }
        Ok(recorded)
    }

    /// Insert a new team
    pub async fn insert_team(&self, team: &NewTeam<'_>) -> Result<i64> {
        let (wikidata_id, api_football_id) = split_external_id(team.external_id);
        let ts = now();

        let result = sqlx::query(
            r#"
            INSERT INTO teams (
                name, short_name, logo, league_id, wikidata_id, api_football_id,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(team.name)
        .bind(team.short_name)
        .bind(team.logo)
        .bind(team.league_id)
        .bind(wikidata_id)
        .bind(api_football_id)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await
        .context("Failed to insert team")?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a new league
    pub async fn insert_league(&self, league: &NewLeague<'_>) -> Result<i64> {
        let (wikidata_id, api_football_id) = split_external_id(league.external_id);
        let ts = now();

        let result = sqlx::query(
            r#"
            INSERT INTO leagues (
                name, short_name, country, logo, wikidata_id, api_football_id,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(league.name)
        .bind(league.short_name)
        .bind(league.country)
        .bind(league.logo)
        .bind(wikidata_id)
        .bind(api_football_id)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await
        .context("Failed to insert league")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_team(&self, id: i64) -> Result<Option<Team>> {
        let sql = format!("SELECT {} FROM teams WHERE id = ?", TEAM_COLUMNS);
        let row = sqlx::query_as::<_, TeamRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch team")?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        let sql = format!("SELECT {} FROM teams ORDER BY id", TEAM_COLUMNS);
        let rows = sqlx::query_as::<_, TeamRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch teams")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn team_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM teams")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count teams")?;

        Ok(row.0)
    }

    /// Teams with no id for `source`, alphabetically
    pub async fn teams_without_external_id(&self, source: Source, limit: i64) -> Result<Vec<Team>> {
        let sql = format!(
            "SELECT {} FROM teams WHERE {} IS NULL ORDER BY name LIMIT ?",
            TEAM_COLUMNS,
            source.column()
        );
        let rows = sqlx::query_as::<_, TeamRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch unmapped teams")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Teams that currently hold at least one player of `nationality` and
    /// are known to API-Football
    pub async fn tracked_api_teams(&self, nationality: &str) -> Result<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(
            r#"
            SELECT DISTINCT t.id, t.name, t.short_name, t.logo, t.league_id,
                   t.wikidata_id, t.api_football_id
            FROM teams t
            JOIN players p ON p.team_id = t.id
            WHERE p.nationality = ? AND t.api_football_id IS NOT NULL
            ORDER BY t.id
            "#,
        )
        .bind(nationality)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch tracked teams")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Teams known to API-Football that play in at least one stored match
    pub async fn match_api_teams(&self) -> Result<Vec<Team>> {
        let sql = format!(
            "SELECT {} FROM teams \
             WHERE api_football_id IS NOT NULL \
             AND (id IN (SELECT home_team_id FROM matches) OR id IN (SELECT away_team_id FROM matches)) \
             ORDER BY id",
            TEAM_COLUMNS
        );
        let rows = sqlx::query_as::<_, TeamRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch match teams")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

        pub async fn set_team_logo(&self, id: i64, logo: &str) -> Result<()> {
        sqlx::query("UPDATE teams SET logo = ?, updated_at = ? WHERE id = ?")
            .bind(logo)
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update team logo")?;

        Ok(())
    }

    /// Delete a team. Fails when other rows still reference it.
    pub async fn delete_team(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete team")?;

        Ok(())
    }

    pub async fn get_league(&self, id: i64) -> Result<Option<League>> {
        let row = sqlx::query_as::<_, LeagueRow>(
            r#"
            SELECT id, name, short_name, country, logo, wikidata_id, api_football_id
            FROM leagues WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch league")?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn league_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leagues")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count leagues")?;

        Ok(row.0)
    }
}

fn split_external_id(external_id: Option<&ExternalId>) -> (Option<String>, Option<i64>) {
    match external_id {
        Some(ExternalId::Wikidata(qid)) => (Some(qid.clone()), None),
        Some(ExternalId::ApiFootball(id)) => (None, Some(*id)),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_team<'a>(name: &'a str, external_id: Option<&'a ExternalId>) -> NewTeam<'a> {
        NewTeam {
            name,
            short_name: "TST",
            logo: None,
            league_id: None,
            external_id,
        }
    }

    #[tokio::test]
    async fn test_external_id_lookup_and_record() {
        let store = Store::in_memory().await.unwrap();
        let af = ExternalId::ApiFootball(2932);
        let team_id = store.insert_team(&new_team("Al-Hilal Saudi FC", Some(&af))).await.unwrap();

        assert_eq!(
            store.find_by_external_id(IdentityKind::Team, &af).await.unwrap(),
            Some(team_id)
        );

        let qid = ExternalId::Wikidata("Q193910".to_string());
        assert!(store.record_external_id(IdentityKind::Team, team_id, &qid).await.unwrap());
        // Already set: never overwritten
        let other = ExternalId::Wikidata("Q1".to_string());
        assert!(!store.record_external_id(IdentityKind::Team, team_id, &other).await.unwrap());

        let team = store.get_team(team_id).await.unwrap().unwrap();
        assert_eq!(team.wikidata_id.as_deref(), Some("Q193910"));
        assert_eq!(team.api_football_id, Some(2932));
    }

    #[tokio::test]
    async fn test_identity_rows_ordered_by_id() {
        let store = Store::in_memory().await.unwrap();
        let a = store.insert_team(&new_team("Zamalek", None)).await.unwrap();
        let b = store.insert_team(&new_team("Ajax", None)).await.unwrap();

        let rows = store.identity_rows(IdentityKind::Team).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a, b]);
        assert!(store.identity_rows(IdentityKind::League).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_teams_without_external_id() {
        let store = Store::in_memory().await.unwrap();
        let af = ExternalId::ApiFootball(85);
        store.insert_team(&new_team("Paris Saint-Germain", Some(&af))).await.unwrap();
        store.insert_team(&new_team("Wydad AC", None)).await.unwrap();

        let unmapped = store
            .teams_without_external_id(Source::ApiFootball, 10)
            .await
            .unwrap();
        assert_eq!(unmapped.len(), 1);
        assert_eq!(unmapped[0].name, "Wydad AC");
    }
}
