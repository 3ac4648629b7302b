use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::UserId;

/// Public-sector tag of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "public_role")]
pub enum PublicRole {
    #[sqlx(rename = "private")]
    #[serde(rename = "private")]
    Private,
    #[sqlx(rename = "GOV")]
    #[serde(rename = "GOV")]
    Gov,
    #[sqlx(rename = "NGO")]
    #[serde(rename = "NGO")]
    Ngo,
}

impl Default for PublicRole {
    fn default() -> Self {
        PublicRole::Private
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub public_role: PublicRole,
    pub payout_account: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl User {
    /// Insert a user; `None` when the username or email is taken.
    pub async fn create(
        username: &str,
        email: &str,
        public_role: PublicRole,
        payout_account: Option<&str>,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, public_role, payout_account)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(public_role)
        .bind(payout_account)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(id: UserId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(user)
    }

    pub async fn exists(id: UserId, conn: &mut PgConnection) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }
}
