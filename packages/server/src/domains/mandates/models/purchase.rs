use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::{Currency, MandateId, MerchantId, Money, PurchaseId, UserId};

/// A purchase charged against a mandate
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Purchase {
    pub id: PurchaseId,
    pub mandate_id: MandateId,
    pub sender_id: UserId,
    pub beneficiary_id: UserId,
    pub merchant_id: MerchantId,
    pub category: String,
    pub amount: Money,
    pub currency: Currency,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        mandate_id: MandateId,
        sender_id: UserId,
        beneficiary_id: UserId,
        merchant_id: MerchantId,
        category: &str,
        amount: Money,
        currency: Currency,
        idempotency_key: &str,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (
                mandate_id,
                sender_id,
                beneficiary_id,
                merchant_id,
                category,
                amount,
                currency,
                idempotency_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(mandate_id)
        .bind(sender_id)
        .bind(beneficiary_id)
        .bind(merchant_id)
        .bind(category)
        .bind(amount)
        .bind(currency)
        .bind(idempotency_key)
        .fetch_one(&mut *conn)
        .await?;
        Ok(purchase)
    }

    pub async fn count_for_mandate(mandate_id: MandateId, conn: &mut PgConnection) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchases WHERE mandate_id = $1")
            .bind(mandate_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}
