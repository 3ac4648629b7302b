use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub actor: String,
    pub action: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub data: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    /// Append an entry. `data` must already be sanitized.
    pub async fn insert(
        actor: &str,
        action: &str,
        entity_kind: &str,
        entity_id: &str,
        data: &JsonValue,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let entry = sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (actor, action, entity_kind, entity_id, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(actor)
        .bind(action)
        .bind(entity_kind)
        .bind(entity_id)
        .bind(data)
        .fetch_one(&mut *conn)
        .await?;
        Ok(entry)
    }

    pub async fn find_for_entity(
        entity_kind: &str,
        entity_id: &str,
        conn: &mut PgConnection,
    ) -> Result<Vec<Self>> {
        let entries = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs WHERE entity_kind = $1 AND entity_id = $2 ORDER BY id",
        )
        .bind(entity_kind)
        .bind(entity_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(entries)
    }

    pub async fn find_by_action(action: &str, conn: &mut PgConnection) -> Result<Vec<Self>> {
        let entries = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs WHERE action = $1 ORDER BY id",
        )
        .bind(action)
        .fetch_all(&mut *conn)
        .await?;
        Ok(entries)
    }
}
