use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;

use crate::common::{Currency, EscrowId, Money, UserId};

/// Escrow lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "escrow_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum EscrowStatus {
    Draft,
    Funded,
    Releasable,
    Released,
    Refunded,
    Cancelled,
}

impl EscrowStatus {
    /// Terminal statuses are sticky.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EscrowStatus::Released | EscrowStatus::Refunded | EscrowStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EscrowStatus::Draft => "DRAFT",
            EscrowStatus::Funded => "FUNDED",
            EscrowStatus::Releasable => "RELEASABLE",
            EscrowStatus::Released => "RELEASED",
            EscrowStatus::Refunded => "REFUNDED",
            EscrowStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Sector an escrow belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "escrow_domain", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EscrowDomain {
    #[default]
    Private,
    Public,
    Aid,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Escrow {
    pub id: EscrowId,
    pub client_id: UserId,
    pub provider_id: UserId,
    pub amount_total: Money,
    pub currency: Currency,
    pub domain: EscrowDomain,
    pub release_conditions: JsonValue,
    pub deadline_at: DateTime<Utc>,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Escrow {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        client_id: UserId,
        provider_id: UserId,
        amount_total: Money,
        currency: Currency,
        domain: EscrowDomain,
        release_conditions: &JsonValue,
        deadline_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let escrow = sqlx::query_as::<_, Escrow>(
            r#"
            INSERT INTO escrows (
                client_id,
                provider_id,
                amount_total,
                currency,
                domain,
                release_conditions,
                deadline_at,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'DRAFT')
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(provider_id)
        .bind(amount_total)
        .bind(currency)
        .bind(domain)
        .bind(release_conditions)
        .bind(deadline_at)
        .fetch_one(&mut *conn)
        .await?;
        Ok(escrow)
    }

    pub async fn find_by_id(id: EscrowId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let escrow = sqlx::query_as::<_, Escrow>("SELECT * FROM escrows WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(escrow)
    }

    /// Load and row-lock the escrow for the rest of the transaction.
    ///
    /// Every mutation of milestones, payments or payees takes this lock first.
    pub async fn lock(id: EscrowId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let escrow = sqlx::query_as::<_, Escrow>("SELECT * FROM escrows WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(escrow)
    }

    pub async fn set_status(
        id: EscrowId,
        status: EscrowStatus,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let escrow = sqlx::query_as::<_, Escrow>(
            r#"
            UPDATE escrows
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;
        Ok(escrow)
    }

    /// FUNDED escrows whose deadline has passed.
    pub async fn find_deadline_due(
        now: DateTime<Utc>,
        limit: i64,
        conn: &mut PgConnection,
    ) -> Result<Vec<EscrowId>> {
        let ids = sqlx::query_scalar::<_, EscrowId>(
            r#"
            SELECT id FROM escrows
            WHERE status = 'FUNDED' AND deadline_at <= $1
            ORDER BY deadline_at
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;
        Ok(ids)
    }
}
