use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::{ApiKeyId, Scope, UserId};

/// An issued API key. Only the lookup prefix and a salted HMAC of the full
/// token are stored.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub name: String,
    pub prefix: String,
    pub salt: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub scopes: Vec<String>,
    pub user_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Parsed scopes; unknown entries are dropped.
    pub fn scope_set(&self) -> Vec<Scope> {
        self.scopes.iter().filter_map(|s| s.parse().ok()).collect()
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl ApiKey {
    pub async fn create(
        name: &str,
        prefix: &str,
        salt: &str,
        key_hash: &str,
        scopes: &[String],
        user_id: Option<UserId>,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let key = sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (name, prefix, salt, key_hash, scopes, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(prefix)
        .bind(salt)
        .bind(key_hash)
        .bind(scopes)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(key)
    }

    pub async fn find_active_by_prefix(prefix: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let key = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE prefix = $1 AND is_active = TRUE",
        )
        .bind(prefix)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(key)
    }

    pub async fn touch(id: ApiKeyId, used_at: DateTime<Utc>, conn: &mut PgConnection) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(used_at)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
