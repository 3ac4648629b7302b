//! Idempotency domain - `(scope, key) → stored result` registry.
//!
//! A use case claims its key inside its own transaction, does the work, then
//! stores the response with [`complete`]. A concurrent request with the same
//! key blocks on the unique index until the first transaction finishes and
//! then sees the stored response.

pub mod models;

use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use tracing::debug;

use crate::common::{AppError, AppResult};
use crate::config::IdempotencyMismatchPolicy;
pub use models::idempotency_record::IdempotencyRecord;

/// Outcome of claiming an idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// First use of the key: do the work, then call [`complete`].
    Fresh,
    /// The key was already used; return the stored response.
    Replay(JsonValue),
}

/// Trim and require a non-empty key.
pub fn require_key(raw: Option<&str>) -> AppResult<String> {
    match raw.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(AppError::idempotency_key_required()),
    }
}

/// Claim `key` within `scope` for a request with the given fingerprint.
pub async fn claim(
    conn: &mut PgConnection,
    scope: &str,
    key: &str,
    fingerprint: &str,
    policy: IdempotencyMismatchPolicy,
) -> AppResult<Claim> {
    if IdempotencyRecord::try_insert(scope, key, fingerprint, conn)
        .await?
        .is_some()
    {
        return Ok(Claim::Fresh);
    }

    let existing = IdempotencyRecord::find(scope, key, conn)
        .await?
        .ok_or_else(|| AppError::idempotency_key_conflict(key))?;

    if existing.fingerprint != fingerprint && policy == IdempotencyMismatchPolicy::Reject {
        return Err(AppError::idempotency_key_conflict(key));
    }

    match existing.response {
        Some(response) => {
            debug!(scope = %scope, key = %key, "idempotent replay");
            Ok(Claim::Replay(response))
        }
        // Placeholder from a transaction that did not store a result
        None => Err(AppError::idempotency_key_conflict(key)),
    }
}

/// Store the response for a claimed key.
pub async fn complete(
    conn: &mut PgConnection,
    scope: &str,
    key: &str,
    response: &JsonValue,
) -> AppResult<()> {
    IdempotencyRecord::store_response(scope, key, response, conn).await?;
    Ok(())
}

/// Look up a key without claiming it.
pub async fn get_existing(
    conn: &mut PgConnection,
    scope: &str,
    key: &str,
) -> AppResult<Option<IdempotencyRecord>> {
    Ok(IdempotencyRecord::find(scope, key, conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_key() {
        assert_eq!(require_key(Some("  abc ")).unwrap(), "abc");
        assert!(require_key(Some("   ")).unwrap_err().is_code("IDEMPOTENCY_KEY_REQUIRED"));
        assert!(require_key(None).unwrap_err().is_code("IDEMPOTENCY_KEY_REQUIRED"));
    }
}
