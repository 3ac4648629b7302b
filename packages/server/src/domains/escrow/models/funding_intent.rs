use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::{EscrowId, FundingIntentId, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "funding_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum FundingStatus {
    Pending,
    Succeeded,
    Failed,
}

/// PSP-side funding request for an escrow
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FundingIntent {
    pub id: FundingIntentId,
    pub escrow_id: EscrowId,
    pub intent_id: String,
    pub amount: Money,
    pub status: FundingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FundingIntent {
    pub async fn create(
        escrow_id: EscrowId,
        intent_id: &str,
        amount: Money,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let intent = sqlx::query_as::<_, FundingIntent>(
            r#"
            INSERT INTO funding_intents (escrow_id, intent_id, amount)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(escrow_id)
        .bind(intent_id)
        .bind(amount)
        .fetch_one(&mut *conn)
        .await?;
        Ok(intent)
    }

    pub async fn lock_by_intent_id(
        intent_id: &str,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let intent = sqlx::query_as::<_, FundingIntent>(
            "SELECT * FROM funding_intents WHERE intent_id = $1 FOR UPDATE",
        )
        .bind(intent_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(intent)
    }

    pub async fn set_status(
        id: FundingIntentId,
        status: FundingStatus,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let intent = sqlx::query_as::<_, FundingIntent>(
            r#"
            UPDATE funding_intents
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;
        Ok(intent)
    }
}
