//! PSP-backed funding: open an intent, then settle it from a webhook.

use serde_json::json;
use sqlx::PgConnection;
use tracing::{info, warn};

use super::ledger::{apply_deposit, escrow_not_found};
use crate::common::{AppError, AppResult, EscrowId, Money, Principal};
use crate::domains::audit;
use crate::domains::escrow::models::{
    Escrow, EscrowEvent as EscrowEventRow, EscrowEventKind, FundingIntent, FundingStatus,
};
use crate::kernel::deps::PSP_CALL_TIMEOUT;
use crate::kernel::ServerDeps;

/// Deposit key used when a funding intent succeeds.
pub fn funding_deposit_key(intent_id: &str) -> String {
    format!("psp:{}", intent_id)
}

/// Ask the PSP for a funding intent and store it as PENDING.
///
/// The PSP is called before the transaction opens so no row lock is held
/// across the network call.
pub async fn create_funding_intent(
    escrow_id: EscrowId,
    amount: Money,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<FundingIntent> {
    if !amount.is_positive() {
        return Err(AppError::invalid_amount("funding amount must be positive"));
    }

    let escrow = {
        let mut conn = deps.db_pool.acquire().await?;
        Escrow::find_by_id(escrow_id, &mut *conn)
            .await?
            .ok_or_else(|| escrow_not_found(escrow_id))?
    };
    ensure_fundable(&escrow)?;

    let intent_id = match tokio::time::timeout(
        PSP_CALL_TIMEOUT,
        deps.psp.create_funding_intent(escrow_id, amount, escrow.currency),
    )
    .await
    {
        Ok(Ok(id)) => id,
        Ok(Err(e)) => {
            warn!(escrow_id = %escrow_id, error = %e, "PSP funding intent failed");
            return Err(psp_unavailable());
        }
        Err(_) => {
            warn!(escrow_id = %escrow_id, "PSP funding intent timed out");
            return Err(psp_unavailable());
        }
    };

    let mut tx = deps.db_pool.begin().await?;
    let escrow = Escrow::lock(escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| escrow_not_found(escrow_id))?;
    ensure_fundable(&escrow)?;

    let intent = FundingIntent::create(escrow_id, &intent_id, amount, &mut *tx).await?;
    EscrowEventRow::append(
        escrow_id,
        EscrowEventKind::FundingIntentCreated,
        &json!({ "intent_id": intent.intent_id, "amount": amount }),
        None,
        &mut *tx,
    )
    .await?;
    audit::record(
        &mut *tx,
        &principal.actor(),
        "FUNDING_INTENT_CREATED",
        "escrow",
        escrow_id,
        json!({ "intent_id": intent.intent_id, "amount": amount }),
    )
    .await?;
    tx.commit().await?;

    info!(escrow_id = %escrow_id, intent_id = %intent.intent_id, amount = %amount, "Funding intent created");
    Ok(intent)
}

/// PSP confirmed the funds: deposit them once and mark the intent SUCCEEDED.
///
/// A FAILED intent may still succeed later; the PSP has the final word.
pub async fn mark_funding_succeeded(
    conn: &mut PgConnection,
    intent_id: &str,
    actor: &str,
) -> AppResult<FundingIntent> {
    let intent = FundingIntent::lock_by_intent_id(intent_id, &mut *conn)
        .await?
        .ok_or_else(|| intent_not_found(intent_id))?;
    if intent.status == FundingStatus::Succeeded {
        return Ok(intent);
    }

    let outcome = apply_deposit(
        conn,
        intent.escrow_id,
        intent.amount,
        &funding_deposit_key(intent_id),
        actor,
    )
    .await?;

    let updated = FundingIntent::set_status(intent.id, FundingStatus::Succeeded, &mut *conn).await?;
    audit::record(
        &mut *conn,
        actor,
        "FUNDING_SUCCEEDED",
        "escrow",
        intent.escrow_id,
        json!({
            "intent_id": intent_id,
            "amount": intent.amount,
            "deposit_id": outcome.deposit.id,
            "status": outcome.escrow.status,
        }),
    )
    .await?;

    info!(escrow_id = %intent.escrow_id, intent_id = %intent_id, "Funding intent succeeded");
    Ok(updated)
}

/// PSP reported the funding failed. Only PENDING intents change.
pub async fn mark_funding_failed(
    conn: &mut PgConnection,
    intent_id: &str,
    actor: &str,
) -> AppResult<FundingIntent> {
    let intent = FundingIntent::lock_by_intent_id(intent_id, &mut *conn)
        .await?
        .ok_or_else(|| intent_not_found(intent_id))?;
    if intent.status != FundingStatus::Pending {
        return Ok(intent);
    }

    let updated = FundingIntent::set_status(intent.id, FundingStatus::Failed, &mut *conn).await?;
    audit::record(
        &mut *conn,
        actor,
        "FUNDING_FAILED",
        "escrow",
        intent.escrow_id,
        json!({ "intent_id": intent_id, "amount": intent.amount }),
    )
    .await?;

    info!(escrow_id = %intent.escrow_id, intent_id = %intent_id, "Funding intent failed");
    Ok(updated)
}

fn ensure_fundable(escrow: &Escrow) -> AppResult<()> {
    if escrow.status.is_terminal() {
        return Err(AppError::invalid_escrow_state(format!(
            "cannot fund a {} escrow",
            escrow.status.as_str()
        )));
    }
    Ok(())
}

fn intent_not_found(intent_id: &str) -> AppError {
    AppError::not_found(
        "FUNDING_INTENT_NOT_FOUND",
        format!("funding intent '{}' not found", intent_id),
    )
}

fn psp_unavailable() -> AppError {
    AppError::unavailable("PSP_UNAVAILABLE", "payment provider unavailable")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funding_deposit_key() {
        assert_eq!(funding_deposit_key("fi-123"), "psp:fi-123");
    }
}
