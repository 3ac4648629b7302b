use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;

use crate::common::{EscrowEventId, EscrowId};

/// Kinds of entries in an escrow's event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowEventKind {
    Deposit,
    ProofUploaded,
    ClientApproved,
    ClientRejected,
    DeadlineApproved,
    Closed,
    Cancelled,
    Refunded,
    FundingIntentCreated,
}

impl EscrowEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EscrowEventKind::Deposit => "DEPOSIT",
            EscrowEventKind::ProofUploaded => "PROOF_UPLOADED",
            EscrowEventKind::ClientApproved => "CLIENT_APPROVED",
            EscrowEventKind::ClientRejected => "CLIENT_REJECTED",
            EscrowEventKind::DeadlineApproved => "DEADLINE_APPROVED",
            EscrowEventKind::Closed => "CLOSED",
            EscrowEventKind::Cancelled => "CANCELLED",
            EscrowEventKind::Refunded => "REFUNDED",
            EscrowEventKind::FundingIntentCreated => "FUNDING_INTENT_CREATED",
        }
    }
}

/// Append-only record of what happened to an escrow
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EscrowEvent {
    pub id: EscrowEventId,
    pub escrow_id: EscrowId,
    pub kind: String,
    pub data: JsonValue,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EscrowEvent {
    pub async fn append(
        escrow_id: EscrowId,
        kind: EscrowEventKind,
        data: &JsonValue,
        idempotency_key: Option<&str>,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let event = sqlx::query_as::<_, EscrowEvent>(
            r#"
            INSERT INTO escrow_events (escrow_id, kind, data, idempotency_key)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(escrow_id)
        .bind(kind.as_str())
        .bind(data)
        .bind(idempotency_key)
        .fetch_one(&mut *conn)
        .await?;
        Ok(event)
    }

    pub async fn list_for_escrow(escrow_id: EscrowId, conn: &mut PgConnection) -> Result<Vec<Self>> {
        let events = sqlx::query_as::<_, EscrowEvent>(
            "SELECT * FROM escrow_events WHERE escrow_id = $1 ORDER BY id",
        )
        .bind(escrow_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(events)
    }

    pub async fn count_of_kind(
        escrow_id: EscrowId,
        kind: EscrowEventKind,
        conn: &mut PgConnection,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM escrow_events WHERE escrow_id = $1 AND kind = $2",
        )
        .bind(escrow_id)
        .bind(kind.as_str())
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }
}
