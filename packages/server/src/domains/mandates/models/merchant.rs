use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::MerchantId;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    pub category: String,
    /// Certified merchants accept mandate purchases without an allowlist entry
    pub is_certified: bool,
    pub created_at: DateTime<Utc>,
}

impl Merchant {
    pub async fn create(
        name: &str,
        category: &str,
        is_certified: bool,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let merchant = sqlx::query_as::<_, Merchant>(
            r#"
            INSERT INTO merchants (name, category, is_certified)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(category)
        .bind(is_certified)
        .fetch_one(&mut *conn)
        .await?;
        Ok(merchant)
    }

    pub async fn find_by_id(id: MerchantId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let merchant = sqlx::query_as::<_, Merchant>("SELECT * FROM merchants WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(merchant)
    }
}
