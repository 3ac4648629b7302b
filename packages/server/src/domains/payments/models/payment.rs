use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::{EscrowId, MilestoneId, Money, PaymentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Sent,
    Settled,
    Error,
    Refunded,
}

impl PaymentStatus {
    /// Payments that have left (or are leaving) the escrow's balance.
    pub fn is_disbursed(self) -> bool {
        matches!(self, PaymentStatus::Sent | PaymentStatus::Settled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Sent => "SENT",
            PaymentStatus::Settled => "SETTLED",
            PaymentStatus::Error => "ERROR",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

/// Outbound transfer from an escrow
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub escrow_id: EscrowId,
    pub milestone_id: Option<MilestoneId>,
    pub amount: Money,
    pub status: PaymentStatus,
    pub psp_ref: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Payment {
    /// Insert a PENDING payment; `None` when the idempotency key is taken.
    pub async fn try_insert(
        escrow_id: EscrowId,
        milestone_id: Option<MilestoneId>,
        amount: Money,
        idempotency_key: &str,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (escrow_id, milestone_id, amount, status, idempotency_key)
            VALUES ($1, $2, $3, 'PENDING', $4)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(escrow_id)
        .bind(milestone_id)
        .bind(amount)
        .bind(idempotency_key)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(payment)
    }

    pub async fn find_by_id(id: PaymentId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(payment)
    }

    pub async fn lock_by_key(key: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE idempotency_key = $1 FOR UPDATE",
        )
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(payment)
    }

    pub async fn find_by_key(key: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE idempotency_key = $1")
                .bind(key)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(payment)
    }

    pub async fn lock_by_id(id: PaymentId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(payment)
    }

    pub async fn find_by_psp_ref(psp_ref: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE psp_ref = $1")
            .bind(psp_ref)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(payment)
    }

    /// Earlier SENT/SETTLED payment for the same milestone and amount.
    pub async fn find_disbursed_for_milestone(
        milestone_id: MilestoneId,
        amount: Money,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE milestone_id = $1
              AND amount = $2
              AND status IN ('SENT', 'SETTLED')
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(milestone_id)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(payment)
    }

    pub async fn list_for_escrow(escrow_id: EscrowId, conn: &mut PgConnection) -> Result<Vec<Self>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE escrow_id = $1 ORDER BY id",
        )
        .bind(escrow_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(payments)
    }

    /// Oldest PENDING payments first.
    pub async fn find_pending_ids(limit: i64, conn: &mut PgConnection) -> Result<Vec<PaymentId>> {
        let ids = sqlx::query_scalar::<_, PaymentId>(
            r#"
            SELECT id FROM payments
            WHERE status = 'PENDING'
            ORDER BY created_at, id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;
        Ok(ids)
    }

    /// Sum of payments in any of `statuses`.
    pub async fn sum_with_status(
        escrow_id: EscrowId,
        statuses: &[PaymentStatus],
        conn: &mut PgConnection,
    ) -> Result<Money> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let total = sqlx::query_scalar::<_, Money>(
            r#"
            SELECT COALESCE(SUM(amount), 0) FROM payments
            WHERE escrow_id = $1 AND status::TEXT = ANY($2)
            "#,
        )
        .bind(escrow_id)
        .bind(&statuses)
        .fetch_one(&mut *conn)
        .await?;
        Ok(total)
    }

    pub async fn count_with_status(
        escrow_id: EscrowId,
        statuses: &[PaymentStatus],
        conn: &mut PgConnection,
    ) -> Result<i64> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments WHERE escrow_id = $1 AND status::TEXT = ANY($2)",
        )
        .bind(escrow_id)
        .bind(&statuses)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// PENDING → SENT, recording the PSP reference.
    pub async fn mark_sent(id: PaymentId, psp_ref: &str, conn: &mut PgConnection) -> Result<Self> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = 'SENT', psp_ref = COALESCE(psp_ref, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(psp_ref)
        .fetch_one(&mut *conn)
        .await?;
        Ok(payment)
    }

    pub async fn set_status(
        id: PaymentId,
        status: PaymentStatus,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;
        Ok(payment)
    }
}
