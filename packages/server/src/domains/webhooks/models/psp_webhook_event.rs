use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;

use crate::common::WebhookEventId;

/// A webhook delivery, unique per `(provider, event_id)`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PspWebhookEvent {
    pub id: WebhookEventId,
    pub provider: String,
    pub event_id: String,
    pub kind: String,
    pub payload: JsonValue,
    pub psp_ref: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl PspWebhookEvent {
    /// Record a delivery; `None` when this event was already received.
    pub async fn try_insert(
        provider: &str,
        event_id: &str,
        kind: &str,
        payload: &JsonValue,
        psp_ref: Option<&str>,
        received_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let event = sqlx::query_as::<_, PspWebhookEvent>(
            r#"
            INSERT INTO psp_webhook_events (provider, event_id, kind, payload, psp_ref, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (provider, event_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(provider)
        .bind(event_id)
        .bind(kind)
        .bind(payload)
        .bind(psp_ref)
        .bind(received_at)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(event)
    }

    pub async fn mark_processed(
        id: WebhookEventId,
        processed_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let event = sqlx::query_as::<_, PspWebhookEvent>(
            "UPDATE psp_webhook_events SET processed_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(processed_at)
        .fetch_one(&mut *conn)
        .await?;
        Ok(event)
    }

    pub async fn find(
        provider: &str,
        event_id: &str,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let event = sqlx::query_as::<_, PspWebhookEvent>(
            "SELECT * FROM psp_webhook_events WHERE provider = $1 AND event_id = $2",
        )
        .bind(provider)
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(event)
    }
}
