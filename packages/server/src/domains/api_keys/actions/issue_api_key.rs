use serde_json::json;
use tracing::info;

use crate::common::auth::token::generate_token;
use crate::common::{AppError, AppResult};
use crate::domains::api_keys::data::{IssueApiKeyRequest, IssuedApiKeyData};
use crate::domains::api_keys::models::ApiKey;
use crate::domains::audit;
use crate::domains::users::User;
use crate::kernel::ServerDeps;

/// Mint a new API key. The plaintext token only exists in the returned value.
pub async fn issue_api_key(
    request: IssueApiKeyRequest,
    actor: &str,
    deps: &ServerDeps,
) -> AppResult<IssuedApiKeyData> {
    let scopes = request.validate()?;
    let scope_names: Vec<String> = scopes.iter().map(|s| s.as_str().to_string()).collect();
    let issued = generate_token(deps.config.api_key_pepper.as_deref());

    let mut tx = deps.db_pool.begin().await?;

    if let Some(user_id) = request.user_id {
        if !User::exists(user_id, &mut *tx).await? {
            return Err(AppError::not_found(
                "USER_NOT_FOUND",
                format!("user {} not found", user_id),
            ));
        }
    }

    let key = ApiKey::create(
        request.name.trim(),
        &issued.prefix,
        &issued.salt,
        &issued.hash,
        &scope_names,
        request.user_id,
        &mut *tx,
    )
    .await?;

    audit::record(
        &mut *tx,
        actor,
        "API_KEY_ISSUED",
        "api_key",
        key.id,
        json!({
            "name": key.name,
            "prefix": key.prefix,
            "scopes": key.scopes,
            "user_id": key.user_id,
        }),
    )
    .await?;
    tx.commit().await?;

    info!(api_key_id = %key.id, prefix = %key.prefix, "API key issued");
    Ok(IssuedApiKeyData::new(key, issued.token))
}
