use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::{DepositId, EscrowId, Money};

/// Funds received into an escrow. Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EscrowDeposit {
    pub id: DepositId,
    pub escrow_id: EscrowId,
    pub amount: Money,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl EscrowDeposit {
    /// Insert a deposit; `None` when the idempotency key is already used.
    pub async fn try_insert(
        escrow_id: EscrowId,
        amount: Money,
        idempotency_key: &str,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let deposit = sqlx::query_as::<_, EscrowDeposit>(
            r#"
            INSERT INTO escrow_deposits (escrow_id, amount, idempotency_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(escrow_id)
        .bind(amount)
        .bind(idempotency_key)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(deposit)
    }

    pub async fn find_by_key(key: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let deposit = sqlx::query_as::<_, EscrowDeposit>(
            "SELECT * FROM escrow_deposits WHERE idempotency_key = $1",
        )
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(deposit)
    }

    pub async fn total_for_escrow(escrow_id: EscrowId, conn: &mut PgConnection) -> Result<Money> {
        let total = sqlx::query_scalar::<_, Money>(
            "SELECT COALESCE(SUM(amount), 0) FROM escrow_deposits WHERE escrow_id = $1",
        )
        .bind(escrow_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(total)
    }

    pub async fn count_for_escrow(escrow_id: EscrowId, conn: &mut PgConnection) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM escrow_deposits WHERE escrow_id = $1")
                .bind(escrow_id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(count)
    }
}
