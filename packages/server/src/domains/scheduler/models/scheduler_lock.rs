use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

/// A named lease that elects one scheduler across instances
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SchedulerLock {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SchedulerLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl SchedulerLock {
    pub async fn find(name: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let lock = sqlx::query_as::<_, SchedulerLock>("SELECT * FROM scheduler_locks WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(lock)
    }

    pub async fn find_for_update(name: &str, conn: &mut PgConnection) -> Result<Option<Self>> {
        let lock = sqlx::query_as::<_, SchedulerLock>(
            "SELECT * FROM scheduler_locks WHERE name = $1 FOR UPDATE",
        )
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(lock)
    }

    /// Insert the lease row; `None` when another instance created it first.
    pub async fn try_insert(
        name: &str,
        owner: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let lock = sqlx::query_as::<_, SchedulerLock>(
            r#"
            INSERT INTO scheduler_locks (name, owner, acquired_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(now)
        .bind(expires_at)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(lock)
    }

    /// Hand the lease to `owner`. Caller holds the row lock.
    pub async fn take_over(
        name: &str,
        owner: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let lock = sqlx::query_as::<_, SchedulerLock>(
            r#"
            UPDATE scheduler_locks
            SET owner = $2, acquired_at = $3, expires_at = $4
            WHERE name = $1
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(owner)
        .bind(now)
        .bind(expires_at)
        .fetch_one(&mut *conn)
        .await?;
        Ok(lock)
    }

    /// Extend the lease. Only the current owner can refresh.
    pub async fn refresh(
        name: &str,
        owner: &str,
        expires_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduler_locks SET expires_at = $3 WHERE name = $1 AND owner = $2",
        )
        .bind(name)
        .bind(owner)
        .bind(expires_at)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Drop the lease. Only the current owner can release.
    pub async fn release(name: &str, owner: &str, conn: &mut PgConnection) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scheduler_locks WHERE name = $1 AND owner = $2")
            .bind(name)
            .bind(owner)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
