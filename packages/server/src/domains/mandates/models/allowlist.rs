use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::{AllowlistEntryId, MerchantId, UserId};

/// Merchant or category a beneficiary may buy from
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AllowlistEntry {
    pub id: AllowlistEntryId,
    pub beneficiary_id: UserId,
    pub merchant_id: Option<MerchantId>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AllowlistEntry {
    pub async fn create(
        beneficiary_id: UserId,
        merchant_id: Option<MerchantId>,
        category: Option<&str>,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let entry = sqlx::query_as::<_, AllowlistEntry>(
            r#"
            INSERT INTO beneficiary_allowlist (beneficiary_id, merchant_id, category)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(beneficiary_id)
        .bind(merchant_id)
        .bind(category)
        .fetch_one(&mut *conn)
        .await?;
        Ok(entry)
    }

    /// True when the beneficiary has an entry for this merchant or category.
    pub async fn permits(
        beneficiary_id: UserId,
        merchant_id: MerchantId,
        category: &str,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let permitted: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM beneficiary_allowlist
                WHERE beneficiary_id = $1
                  AND (merchant_id = $2 OR LOWER(category) = LOWER($3))
            )
            "#,
        )
        .bind(beneficiary_id)
        .bind(merchant_id)
        .bind(category)
        .fetch_one(&mut *conn)
        .await?;
        Ok(permitted)
    }
}
