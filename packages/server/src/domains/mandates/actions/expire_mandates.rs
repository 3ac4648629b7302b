use serde_json::json;
use tracing::info;

use crate::common::AppResult;
use crate::domains::audit;
use crate::domains::mandates::models::UsageMandate;
use crate::kernel::ServerDeps;

/// Expire every ACTIVE mandate whose deadline has passed. Returns how many
/// were expired.
pub async fn expire_mandates(actor: &str, deps: &ServerDeps) -> AppResult<usize> {
    let now = deps.clock.now();
    let mut tx = deps.db_pool.begin().await?;

    let expired = UsageMandate::expire_due(now, &mut *tx).await?;
    for mandate in &expired {
        audit::record(
            &mut *tx,
            actor,
            "MANDATE_EXPIRED",
            "mandate",
            mandate.id,
            json!({
                "expires_at": mandate.expires_at,
                "total_spent": mandate.total_spent,
                "total_amount": mandate.total_amount,
            }),
        )
        .await?;
    }

    tx.commit().await?;

    if !expired.is_empty() {
        info!(count = expired.len(), "Expired mandates");
    }
    Ok(expired.len())
}
