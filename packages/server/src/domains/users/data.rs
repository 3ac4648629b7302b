use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::user::{PublicRole, User};
use crate::common::{AppError, AppResult, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub public_role: Option<PublicRole>,
    #[serde(default)]
    pub payout_account: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> AppResult<()> {
        let username = self.username.trim();
        if username.is_empty() || username.len() > 64 {
            return Err(AppError::bad_request(
                "INVALID_PAYLOAD",
                "username must be 1..=64 characters",
            ));
        }
        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !well_formed {
            return Err(AppError::bad_request("INVALID_PAYLOAD", "email is invalid"));
        }
        Ok(())
    }
}

/// Public representation of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub public_role: PublicRole,
    pub has_payout_account: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            public_role: user.public_role,
            has_payout_account: user.payout_account.is_some(),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}
