use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::common::auth::token::{parse_prefix, verify_token};
use crate::common::auth::Credential;
use crate::common::{AppError, AppResult, Principal};
use crate::domains::api_keys::models::ApiKey;
use crate::kernel::ServerDeps;

fn unauthorized() -> AppError {
    AppError::unauthorized("UNAUTHORIZED", "invalid API key")
}

/// Resolve a presented credential to a principal.
///
/// Issued tokens are looked up by prefix and checked against the stored
/// HMAC. The shared legacy key is only honoured in dev environments.
pub async fn authenticate(credential: &str, deps: &ServerDeps) -> AppResult<Principal> {
    let credential = credential.trim();
    if credential.is_empty() {
        return Err(AppError::unauthorized("NO_API_KEY", "an API key is required"));
    }

    if let Some(prefix) = parse_prefix(credential) {
        let mut conn = deps.db_pool.acquire().await?;
        let key = ApiKey::find_active_by_prefix(prefix, &mut conn)
            .await?
            .ok_or_else(unauthorized)?;
        if !verify_token(
            credential,
            &key.salt,
            &key.key_hash,
            deps.config.api_key_pepper.as_deref(),
        ) {
            debug!(prefix, "API key hash mismatch");
            return Err(unauthorized());
        }
        ApiKey::touch(key.id, deps.clock.now(), &mut conn).await?;

        return Ok(Principal {
            scopes: key.scope_set(),
            name: key.name,
            user_id: key.user_id,
            credential: Credential::ApiKey(key.id),
        });
    }

    let legacy_matches = deps
        .config
        .legacy_api_key
        .as_deref()
        .map(|legacy| bool::from(legacy.as_bytes().ct_eq(credential.as_bytes())))
        .unwrap_or(false);
    if legacy_matches {
        if deps.config.app_env.allows_legacy_key() {
            return Ok(Principal::legacy());
        }
        warn!(app_env = deps.config.app_env.as_str(), "Legacy API key refused");
        return Err(AppError::unauthorized(
            "LEGACY_KEY_FORBIDDEN",
            "the shared API key is disabled in this environment",
        ));
    }

    Err(unauthorized())
}
