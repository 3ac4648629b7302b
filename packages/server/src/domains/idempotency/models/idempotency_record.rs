use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IdempotencyRecord {
    pub id: i64,
    pub scope: String,
    pub key: String,
    pub fingerprint: String,
    pub response: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl IdempotencyRecord {
    /// Insert a placeholder; `None` when the key already exists in this scope.
    pub async fn try_insert(
        scope: &str,
        key: &str,
        fingerprint: &str,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            r#"
            INSERT INTO idempotency_records (scope, key, fingerprint)
            VALUES ($1, $2, $3)
            ON CONFLICT (scope, key) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(scope)
        .bind(key)
        .bind(fingerprint)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(record)
    }

    pub async fn find(scope: &str, key: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT * FROM idempotency_records WHERE scope = $1 AND key = $2",
        )
        .bind(scope)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(record)
    }

    pub async fn store_response(
        scope: &str,
        key: &str,
        response: &JsonValue,
        conn: &mut PgConnection,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE idempotency_records
            SET response = $3, completed_at = NOW()
            WHERE scope = $1 AND key = $2
            "#,
        )
        .bind(scope)
        .bind(key)
        .bind(response)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn count(scope: &str, key: &str, conn: &mut PgConnection) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM idempotency_records WHERE scope = $1 AND key = $2",
        )
        .bind(scope)
        .bind(key)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }
}
