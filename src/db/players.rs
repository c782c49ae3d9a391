use anyhow::{Context, Result};

use super::store::{now, Store};
use crate::models::{Player, PlayerUpsert, Position, UpsertOutcome};

/// Database row representation
#[derive(sqlx::FromRow)]
struct PlayerRow {
    id: i64,
    name: String,
    position: Option<String>,
    nationality: String,
    team_id: Option<i64>,
    date_of_birth: Option<String>,
    image_url: Option<String>,
    market_value: Option<f64>,
    wikidata_id: Option<String>,
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Player {
            id: row.id,
            name: row.name,
            position: row.position.as_deref().and_then(Position::parse),
            nationality: row.nationality,
            team_id: row.team_id,
            date_of_birth: row.date_of_birth,
            image_url: row.image_url,
            market_value: row.market_value,
            wikidata_id: row.wikidata_id,
        }
    }
}

const PLAYER_COLUMNS: &str =
    "id, name, position, nationality, team_id, date_of_birth, image_url, market_value, wikidata_id";

// Fill only what is still null
const FILL_NULLS: &str = r#"
    UPDATE players SET
        position = COALESCE(position, ?),
        team_id = COALESCE(team_id, ?),
        date_of_birth = COALESCE(date_of_birth, ?),
        image_url = COALESCE(image_url, ?),
        wikidata_id = COALESCE(wikidata_id, ?),
        updated_at = ?
    WHERE id = ?
"#;

// Same, but the offered team replaces the stored one
const FILL_NULLS_FORCE_TEAM: &str = r#"
    UPDATE players SET
        position = COALESCE(position, ?),
        team_id = ?,
        date_of_birth = COALESCE(date_of_birth, ?),
        image_url = COALESCE(image_url, ?),
        wikidata_id = COALESCE(wikidata_id, ?),
        updated_at = ?
    WHERE id = ?
"#;

impl Store {
    pub async fn get_player(&self, id: i64) -> Result<Option<Player>> {
        let sql = format!("SELECT {} FROM players WHERE id = ?", PLAYER_COLUMNS);
        let row = sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch player")?;

        Ok(row.map(|r| r.into()))
    }

    /// Existing player for a sync record: same Wikidata id first, then same name
    pub async fn find_player(&self, name: &str, wikidata_id: Option<&str>) -> Result<Option<Player>> {
        if let Some(qid) = wikidata_id {
            let sql = format!("SELECT {} FROM players WHERE wikidata_id = ?", PLAYER_COLUMNS);
            let row = sqlx::query_as::<_, PlayerRow>(&sql)
                .bind(qid)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to look up player by wikidata id")?;

            if let Some(row) = row {
                return Ok(Some(row.into()));
            }
        }

        let sql = format!(
            "SELECT {} FROM players WHERE name = ? ORDER BY id LIMIT 1",
            PLAYER_COLUMNS
        );
        let row = sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up player by name")?;

        Ok(row.map(|r| r.into()))
    }

    /// Insert a player, or fill the null fields of the existing one.
    /// An existing team is only replaced when `force_team` is set and a
    /// team is offered.
    pub async fn upsert_player(&self, player: &PlayerUpsert) -> Result<UpsertOutcome> {
        let existing = self
            .find_player(&player.name, player.wikidata_id.as_deref())
            .await?;

        let Some(existing) = existing else {
            let id = self.insert_player(player).await?;
            return Ok(UpsertOutcome::Inserted(id));
        };

        let sql = if player.force_team && player.team_id.is_some() {
            FILL_NULLS_FORCE_TEAM
        } else {
            FILL_NULLS
        };

        sqlx::query(sql)
            .bind(player.position.map(|p| p.as_str()))
            .bind(player.team_id)
            .bind(&player.date_of_birth)
            .bind(&player.image_url)
            .bind(&player.wikidata_id)
            .bind(now())
            .bind(existing.id)
            .execute(&self.pool)
            .await
            .context("Failed to update player")?;

        Ok(UpsertOutcome::Updated(existing.id))
    }

    async fn insert_player(&self, player: &PlayerUpsert) -> Result<i64> {
        let ts = now();
        let position = player.position.unwrap_or(Position::MF);

        let result = sqlx::query(
            r#"
            INSERT INTO players (
                name, position, nationality, team_id, date_of_birth, image_url,
                wikidata_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&player.name)
        .bind(position.as_str())
        .bind(&player.nationality)
        .bind(player.team_id)
        .bind(&player.date_of_birth)
        .bind(&player.image_url)
        .bind(&player.wikidata_id)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await
        .context("Failed to insert player")?;

        Ok(result.last_insert_rowid())
    }

    /// Ids of `nationality` players currently assigned to either team
    pub async fn tracked_player_ids(
        &self,
        nationality: &str,
        home_team_id: i64,
        away_team_id: i64,
    ) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM players
            WHERE nationality = ? AND (team_id = ? OR team_id = ?)
            ORDER BY id
            "#,
        )
        .bind(nationality)
        .bind(home_team_id)
        .bind(away_team_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch tracked players")?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Every player of `nationality`, by id
    pub async fn tracked_players(&self, nationality: &str) -> Result<Vec<Player>> {
        let sql = format!(
            "SELECT {} FROM players WHERE nationality = ? ORDER BY id",
            PLAYER_COLUMNS
        );
        let rows = sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(nationality)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch tracked players")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn players_for_team(&self, team_id: i64) -> Result<Vec<Player>> {
        let sql = format!(
            "SELECT {} FROM players WHERE team_id = ? ORDER BY id",
            PLAYER_COLUMNS
        );
        let rows = sqlx::query_as::<_, PlayerRow>(&sql)
            .bind(team_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch team players")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Move every player of one team to another, returning how many moved
    pub async fn reassign_players(&self, from_team_id: i64, to_team_id: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE players SET team_id = ?, updated_at = ? WHERE team_id = ?")
            .bind(to_team_id)
            .bind(now())
            .bind(from_team_id)
            .execute(&self.pool)
            .await
            .context("Failed to reassign players")?;

        Ok(result.rows_affected())
    }

    pub async fn player_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM players")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count players")?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewTeam;

    async fn team(store: &Store, name: &str) -> i64 {
        store
            .insert_team(&NewTeam {
                name,
                short_name: "TST",
                logo: None,
                league_id: None,
                external_id: None,
            })
            .await
            .unwrap()
    }

    fn upsert(name: &str, team_id: Option<i64>) -> PlayerUpsert {
        PlayerUpsert {
            name: name.to_string(),
            nationality: "Morocco".to_string(),
            team_id,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_defaults_position() {
        let store = Store::in_memory().await.unwrap();
        let outcome = store.upsert_player(&upsert("Achraf Hakimi", None)).await.unwrap();

        let UpsertOutcome::Inserted(id) = outcome else {
            panic!("expected insert, got {:?}", outcome);
        };
        let player = store.get_player(id).await.unwrap().unwrap();
        assert_eq!(player.position, Some(Position::MF));
        assert_eq!(player.team_id, None);
    }

    #[tokio::test]
    async fn test_update_never_clears_team() {
        let store = Store::in_memory().await.unwrap();
        let psg = team(&store, "Paris Saint-Germain").await;
        store.upsert_player(&upsert("Achraf Hakimi", Some(psg))).await.unwrap();

        let outcome = store.upsert_player(&upsert("Achraf Hakimi", None)).await.unwrap();
        let UpsertOutcome::Updated(id) = outcome else {
            panic!("expected update, got {:?}", outcome);
        };

        assert_eq!(store.get_player(id).await.unwrap().unwrap().team_id, Some(psg));
        assert_eq!(store.player_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_preserves_existing_team_unless_forced() {
        let store = Store::in_memory().await.unwrap();
        let psg = team(&store, "Paris Saint-Germain").await;
        let inter = team(&store, "Inter Milan").await;
        store.upsert_player(&upsert("Achraf Hakimi", Some(psg))).await.unwrap();

        let UpsertOutcome::Updated(id) =
            store.upsert_player(&upsert("Achraf Hakimi", Some(inter))).await.unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(store.get_player(id).await.unwrap().unwrap().team_id, Some(psg));

        let mut forced = upsert("Achraf Hakimi", Some(inter));
        forced.force_team = true;
        store.upsert_player(&forced).await.unwrap();
        assert_eq!(store.get_player(id).await.unwrap().unwrap().team_id, Some(inter));
    }

    #[tokio::test]
    async fn test_update_fills_nulls() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_player(&upsert("Yassine Bounou", None)).await.unwrap();

        let mut record = upsert("Yassine Bounou", None);
        record.image_url = Some("http://commons.wikimedia.org/bounou.jpg".to_string());
        record.wikidata_id = Some("Q3572095".to_string());
        record.position = Some(Position::GK);
        let UpsertOutcome::Updated(id) = store.upsert_player(&record).await.unwrap() else {
            panic!("expected update");
        };

        let player = store.get_player(id).await.unwrap().unwrap();
        assert_eq!(player.image_url, record.image_url);
        assert_eq!(player.wikidata_id.as_deref(), Some("Q3572095"));
        // Position was already set on insert
        assert_eq!(player.position, Some(Position::MF));
    }

    #[tokio::test]
    async fn test_tracked_player_ids_filters_nationality() {
        let store = Store::in_memory().await.unwrap();
        let home = team(&store, "Sevilla").await;
        let away = team(&store, "Real Betis").await;
        store.upsert_player(&upsert("Youssef En-Nesyri", Some(home))).await.unwrap();
        store.upsert_player(&upsert("Sofyan Amrabat", Some(away))).await.unwrap();

        let mut other = upsert("Jesus Navas", Some(home));
        other.nationality = "Spain".to_string();
        store.upsert_player(&other).await.unwrap();

        let ids = store.tracked_player_ids("Morocco", home, away).await.unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_reassign_players() {
        let store = Store::in_memory().await.unwrap();
        let dup = team(&store, "Al-Hilal").await;
        let canonical = team(&store, "Al-Hilal Saudi FC").await;
        store.upsert_player(&upsert("Yassine Bounou", Some(dup))).await.unwrap();

        assert_eq!(store.reassign_players(dup, canonical).await.unwrap(), 1);
        assert!(store.players_for_team(dup).await.unwrap().is_empty());
        assert_eq!(store.players_for_team(canonical).await.unwrap().len(), 1);
    }
}
