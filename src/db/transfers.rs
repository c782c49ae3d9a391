use anyhow::{Context, Result};

use super::store::{now, Store};
use crate::models::{Transfer, TransferType};

/// Database row representation
#[derive(sqlx::FromRow)]
struct TransferRow {
    id: i64,
    player_id: i64,
    from_team_id: Option<i64>,
    to_team_id: Option<i64>,
    league_id: Option<i64>,
    fee: Option<f64>,
    transfer_type: String,
    contract_start: Option<String>,
    contract_end: Option<String>,
    market_value: Option<f64>,
    transfer_date: String,
}

impl From<TransferRow> for Transfer {
    fn from(row: TransferRow) -> Self {
        Transfer {
            id: Some(row.id),
            player_id: row.player_id,
            from_team_id: row.from_team_id,
            to_team_id: row.to_team_id,
            league_id: row.league_id,
            fee: row.fee,
            transfer_type: TransferType::parse(&row.transfer_type),
            contract_start: row.contract_start,
            contract_end: row.contract_end,
            market_value: row.market_value,
            transfer_date: row.transfer_date,
        }
    }
}

impl Store {
    pub async fn insert_transfer(&self, transfer: &Transfer) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO transfers (
                player_id, from_team_id, to_team_id, league_id, fee, transfer_type,
                contract_start, contract_end, market_value, transfer_date, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transfer.player_id)
        .bind(transfer.from_team_id)
        .bind(transfer.to_team_id)
        .bind(transfer.league_id)
        .bind(transfer.fee)
        .bind(transfer.transfer_type.as_str())
        .bind(&transfer.contract_start)
        .bind(&transfer.contract_end)
        .bind(transfer.market_value)
        .bind(&transfer.transfer_date)
        .bind(now())
        .execute(&self.pool)
        .await
        .context("Failed to insert transfer")?;

        Ok(result.last_insert_rowid())
    }

    /// Transfers of a player, latest first
    pub async fn transfers_for_player(&self, player_id: i64) -> Result<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, player_id, from_team_id, to_team_id, league_id, fee, transfer_type,
                   contract_start, contract_end, market_value, transfer_date
            FROM transfers
            WHERE player_id = ?
            ORDER BY transfer_date DESC
            "#,
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch transfers")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayerUpsert;
    use crate::models::UpsertOutcome;

    #[tokio::test]
    async fn test_transfers_latest_first() {
        let store = Store::in_memory().await.unwrap();
        let UpsertOutcome::Inserted(player_id) = store
            .upsert_player(&PlayerUpsert {
                name: "Hakim Ziyech".to_string(),
                nationality: "Morocco".to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
        else {
            panic!("expected insert");
        };

        for (date, kind) in [("2020-07-01", TransferType::Permanent), ("2023-09-01", TransferType::Loan)] {
            store
                .insert_transfer(&Transfer {
                    id: None,
                    player_id,
                    from_team_id: None,
                    to_team_id: None,
                    league_id: None,
                    fee: None,
                    transfer_type: kind,
                    contract_start: None,
                    contract_end: None,
                    market_value: None,
                    transfer_date: date.to_string(),
                })
                .await
                .unwrap();
        }

        let transfers = store.transfers_for_player(player_id).await.unwrap();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].transfer_type, TransferType::Loan);
        assert_eq!(transfers[1].transfer_date, "2020-07-01");
    }
}
