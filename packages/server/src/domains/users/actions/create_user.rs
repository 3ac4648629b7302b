use serde_json::json;
use tracing::info;

use crate::common::{AppError, AppResult, Principal};
use crate::domains::audit;
use crate::domains::users::data::CreateUserRequest;
use crate::domains::users::models::user::User;
use crate::kernel::ServerDeps;

/// Register a user. Username and email are unique.
pub async fn create_user(
    request: CreateUserRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<User> {
    request.validate()?;

    let mut tx = deps.db_pool.begin().await?;

    let user = User::create(
        request.username.trim(),
        &request.email.trim().to_ascii_lowercase(),
        request.public_role.unwrap_or_default(),
        request.payout_account.as_deref().map(str::trim),
        &mut *tx,
    )
    .await?
    .ok_or_else(|| AppError::conflict("USER_EXISTS", "username or email already registered"))?;

    audit::record(
        &mut *tx,
        &principal.actor(),
        "USER_CREATED",
        "user",
        user.id,
        json!({
            "username": user.username,
            "email": user.email,
            "public_role": user.public_role,
            "payout_account": user.payout_account,
        }),
    )
    .await?;

    tx.commit().await?;

    info!(user_id = %user.id, "User created");
    Ok(user)
}
