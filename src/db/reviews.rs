use anyhow::{Context, Result};

use super::store::{now, Store};
use crate::models::IdentityKind;

/// A resolution where several stored rows looked like the same club
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityReview {
    pub id: i64,
    pub kind: String,
    pub candidate_name: String,
    pub matched_ids: Vec<i64>,
    pub resolved_id: i64,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    kind: String,
    candidate_name: String,
    matched_ids: String,
    resolved_id: i64,
    created_at: String,
}

impl From<ReviewRow> for IdentityReview {
    fn from(row: ReviewRow) -> Self {
        IdentityReview {
            id: row.id,
            kind: row.kind,
            candidate_name: row.candidate_name,
            matched_ids: serde_json::from_str(&row.matched_ids).unwrap_or_default(),
            resolved_id: row.resolved_id,
            created_at: row.created_at,
        }
    }
}

impl Store {
    pub async fn insert_review(
        &self,
        kind: IdentityKind,
        candidate_name: &str,
        matched_ids: &[i64],
        resolved_id: i64,
    ) -> Result<i64> {
        let matched = serde_json::to_string(matched_ids)?;

        let result = sqlx::query(
            r#"
            INSERT INTO identity_reviews (kind, candidate_name, matched_ids, resolved_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(kind.as_str())
        .bind(candidate_name)
        .bind(matched)
        .bind(resolved_id)
        .bind(now())
        .execute(&self.pool)
        .await
        .context("Failed to insert identity review")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn identity_reviews(&self) -> Result<Vec<IdentityReview>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, kind, candidate_name, matched_ids, resolved_id, created_at
            FROM identity_reviews ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch identity reviews")?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}
