use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::{Currency, MandateId, MerchantId, Money, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "mandate_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MandateStatus {
    Active,
    Expired,
    Consumed,
}

/// Spending cap a sender grants a beneficiary
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageMandate {
    pub id: MandateId,
    pub sender_id: UserId,
    pub beneficiary_id: UserId,
    pub total_amount: Money,
    pub total_spent: Money,
    pub currency: Currency,
    pub allowed_category: Option<String>,
    pub allowed_merchant_id: Option<MerchantId>,
    pub expires_at: DateTime<Utc>,
    pub status: MandateStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsageMandate {
    pub fn remaining(&self) -> Money {
        self.total_amount.saturating_sub(self.total_spent)
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl UsageMandate {
    /// Insert an ACTIVE mandate; `None` when the triple already has one.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        sender_id: UserId,
        beneficiary_id: UserId,
        total_amount: Money,
        currency: Currency,
        allowed_category: Option<&str>,
        allowed_merchant_id: Option<MerchantId>,
        expires_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let mandate = sqlx::query_as::<_, UsageMandate>(
            r#"
            INSERT INTO usage_mandates (
                sender_id,
                beneficiary_id,
                total_amount,
                currency,
                allowed_category,
                allowed_merchant_id,
                expires_at,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'ACTIVE')
            ON CONFLICT (sender_id, beneficiary_id, currency) WHERE status = 'ACTIVE' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(sender_id)
        .bind(beneficiary_id)
        .bind(total_amount)
        .bind(currency)
        .bind(allowed_category)
        .bind(allowed_merchant_id)
        .bind(expires_at)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(mandate)
    }

    pub async fn find_by_id(id: MandateId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let mandate =
            sqlx::query_as::<_, UsageMandate>("SELECT * FROM usage_mandates WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(mandate)
    }

    /// The ACTIVE, unexpired mandate for a triple.
    pub async fn find_active(
        sender_id: UserId,
        beneficiary_id: UserId,
        currency: Currency,
        now: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let mandate = sqlx::query_as::<_, UsageMandate>(
            r#"
            SELECT * FROM usage_mandates
            WHERE sender_id = $1
              AND beneficiary_id = $2
              AND currency = $3
              AND status = 'ACTIVE'
              AND expires_at > $4
            "#,
        )
        .bind(sender_id)
        .bind(beneficiary_id)
        .bind(currency)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(mandate)
    }

    /// Atomically add `amount` to `total_spent`.
    ///
    /// Succeeds only while the mandate is ACTIVE, unexpired and has room; flips
    /// to CONSUMED when the total is reached. `None` means no row qualified.
    pub async fn consume(
        id: MandateId,
        amount: Money,
        now: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let mandate = sqlx::query_as::<_, UsageMandate>(
            r#"
            UPDATE usage_mandates
            SET total_spent = total_spent + $2,
                status = CASE
                    WHEN total_spent + $2 = total_amount THEN 'CONSUMED'::mandate_status
                    ELSE status
                END,
                updated_at = NOW()
            WHERE id = $1
              AND status = 'ACTIVE'
              AND expires_at > $3
              AND total_spent + $2 <= total_amount
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(mandate)
    }

    /// Expire ACTIVE mandates past their deadline for one triple.
    pub async fn expire_stale_for_triple(
        sender_id: UserId,
        beneficiary_id: UserId,
        currency: Currency,
        now: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Vec<Self>> {
        let mandates = sqlx::query_as::<_, UsageMandate>(
            r#"
            UPDATE usage_mandates
            SET status = 'EXPIRED', updated_at = NOW()
            WHERE sender_id = $1
              AND beneficiary_id = $2
              AND currency = $3
              AND status = 'ACTIVE'
              AND expires_at <= $4
            RETURNING *
            "#,
        )
        .bind(sender_id)
        .bind(beneficiary_id)
        .bind(currency)
        .bind(now)
        .fetch_all(&mut *conn)
        .await?;
        Ok(mandates)
    }

    /// Expire every ACTIVE mandate past its deadline.
    pub async fn expire_due(now: DateTime<Utc>, conn: &mut PgConnection) -> Result<Vec<Self>> {
        let mandates = sqlx::query_as::<_, UsageMandate>(
            r#"
            UPDATE usage_mandates
            SET status = 'EXPIRED', updated_at = NOW()
            WHERE status = 'ACTIVE' AND expires_at <= $1
            RETURNING *
            "#,
        )
        .bind(now)
        .fetch_all(&mut *conn)
        .await?;
        Ok(mandates)
    }
}
