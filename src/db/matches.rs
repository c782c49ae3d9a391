use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

use super::store::{now, Store};
use crate::models::{Match, MatchStatus, MatchUpsert};

/// Database row representation
#[derive(sqlx::FromRow)]
struct MatchRow {
    id: String,
    home_team_id: i64,
    away_team_id: i64,
    league_id: Option<i64>,
    kickoff_time: String,
    status: String,
    home_score: Option<i32>,
    away_score: Option<i32>,
    venue: Option<String>,
    api_football_id: Option<i64>,
}

impl From<MatchRow> for Match {
    fn from(row: MatchRow) -> Self {
        let kickoff_time = parse_kickoff(&row.id, &row.kickoff_time);
        Match {
            id: row.id,
            home_team_id: row.home_team_id,
            away_team_id: row.away_team_id,
            league_id: row.league_id,
            kickoff_time,
            status: MatchStatus::parse(&row.status),
            home_score: row.home_score,
            away_score: row.away_score,
            venue: row.venue,
            api_football_id: row.api_football_id,
        }
    }
}

/// Stored kickoff time; an unreadable value is logged and replaced by now
fn parse_kickoff(match_id: &str, raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            warn!("Match {} has unreadable kickoff_time '{}': {}", match_id, raw, e);
            Utc::now()
        }
    }
}

const MATCH_COLUMNS: &str = "id, home_team_id, away_team_id, league_id, kickoff_time, status, \
     home_score, away_score, venue, api_football_id";

impl Store {
    pub async fn match_exists(&self, id: &str) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM matches WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check match existence")?;

        Ok(row.0 > 0)
    }

    /// Insert a match, or refresh score/status/kickoff/venue of the stored
    /// one. Team, league and external ids of an existing row are kept.
    pub async fn upsert_match(&self, m: &Match) -> Result<MatchUpsert> {
        let ts = now();

        if self.match_exists(&m.id).await? {
            sqlx::query(
                r#"
                UPDATE matches SET
                    home_score = ?, away_score = ?, status = ?,
                    kickoff_time = ?, venue = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(m.home_score)
            .bind(m.away_score)
            .bind(m.status.as_str())
            .bind(m.kickoff_time.to_rfc3339())
            .bind(&m.venue)
            .bind(&ts)
            .bind(&m.id)
            .execute(&self.pool)
            .await
            .context("Failed to update match")?;

            return Ok(MatchUpsert::Updated);
        }

        sqlx::query(
            r#"
            INSERT INTO matches (
                id, home_team_id, away_team_id, league_id, kickoff_time, status,
                home_score, away_score, venue, api_football_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&m.id)
        .bind(m.home_team_id)
        .bind(m.away_team_id)
        .bind(m.league_id)
        .bind(m.kickoff_time.to_rfc3339())
        .bind(m.status.as_str())
        .bind(m.home_score)
        .bind(m.away_score)
        .bind(&m.venue)
        .bind(m.api_football_id)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await
        .context("Failed to insert match")?;

        Ok(MatchUpsert::Inserted)
    }

    /// Update status and score of a known match. Returns false if unknown.
    pub async fn update_match_progress(
        &self,
        id: &str,
        status: MatchStatus,
        home_score: Option<i32>,
        away_score: Option<i32>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE matches SET status = ?, home_score = ?, away_score = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(home_score)
        .bind(away_score)
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update match progress")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_match(&self, id: &str) -> Result<Option<Match>> {
        let sql = format!("SELECT {} FROM matches WHERE id = ?", MATCH_COLUMNS);
        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch match")?;

        Ok(row.map(|r| r.into()))
    }

    /// Most recent matches by kickoff
    pub async fn recent_matches(&self, limit: i64) -> Result<Vec<Match>> {
        let sql = format!(
            "SELECT {} FROM matches ORDER BY kickoff_time DESC LIMIT ?",
            MATCH_COLUMNS
        );
        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch matches")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Most recent matches that carry an API-Football fixture id
    pub async fn recent_api_matches(&self, limit: i64) -> Result<Vec<Match>> {
        let sql = format!(
            "SELECT {} FROM matches WHERE api_football_id IS NOT NULL \
             ORDER BY kickoff_time DESC LIMIT ?",
            MATCH_COLUMNS
        );
        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch API-Football matches")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn match_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM matches")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count matches")?;

        Ok(row.0)
    }

    /// Record that a player is associated with a match. Returns false when
    /// the pair was already recorded.
    pub async fn link_player(&self, match_id: &str, player_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO match_players (match_id, player_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (match_id, player_id) DO NOTHING
            "#,
        )
        .bind(match_id)
        .bind(player_id)
        .bind(now())
        .execute(&self.pool)
        .await
        .context("Failed to link player to match")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn match_player_ids(&self, match_id: &str) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT player_id FROM match_players WHERE match_id = ? ORDER BY player_id",
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch match players")?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
