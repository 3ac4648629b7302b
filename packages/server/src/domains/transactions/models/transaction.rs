use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::{Currency, Money, TransactionId, UserId};

/// Direct user-to-user transfer recorded by an operator
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: TransactionId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub amount: Money,
    pub currency: Currency,
    pub status: String,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub async fn create(
        sender_id: UserId,
        receiver_id: UserId,
        amount: Money,
        currency: Currency,
        idempotency_key: &str,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (sender_id, receiver_id, amount, currency, status, idempotency_key)
            VALUES ($1, $2, $3, $4, 'COMPLETED', $5)
            RETURNING *
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(amount)
        .bind(currency)
        .bind(idempotency_key)
        .fetch_one(&mut *conn)
        .await?;
        Ok(transaction)
    }

    pub async fn find_by_key(key: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let transaction =
            sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE idempotency_key = $1")
                .bind(key)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(transaction)
    }
}
