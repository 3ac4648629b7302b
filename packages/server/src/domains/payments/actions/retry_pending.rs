use tracing::error;

use super::executor::send_pending;
use super::settlement::close_if_complete;
use crate::common::{AppError, AppResult, PaymentId};
use crate::domains::escrow::models::Escrow;
use crate::domains::payments::models::{Payment, PaymentStatus};
use crate::kernel::ServerDeps;

/// Payments handed back to the PSP per pass.
const RETRY_BATCH: i64 = 50;

/// Offer the oldest PENDING payments to the PSP again.
///
/// Returns how many moved to SENT. A payment the PSP still refuses stays
/// PENDING for the next pass.
pub async fn retry_pending_payouts(actor: &str, deps: &ServerDeps) -> AppResult<usize> {
    let pending = {
        let mut conn = deps.db_pool.acquire().await?;
        Payment::find_pending_ids(RETRY_BATCH, &mut conn).await?
    };

    let mut sent = 0;
    for payment_id in pending {
        match retry_one(payment_id, actor, deps).await {
            Ok(true) => sent += 1,
            Ok(false) => {}
            Err(e) => error!(payment_id = %payment_id, error = %e, "Payout retry failed"),
        }
    }
    Ok(sent)
}

async fn retry_one(payment_id: PaymentId, actor: &str, deps: &ServerDeps) -> AppResult<bool> {
    let mut tx = deps.db_pool.begin().await?;

    let Some(payment) = Payment::find_by_id(payment_id, &mut *tx).await? else {
        return Ok(false);
    };
    let escrow = Escrow::lock(payment.escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("ESCROW_NOT_FOUND", "escrow not found"))?;
    let payment = match Payment::lock_by_id(payment_id, &mut *tx).await? {
        // Another caller may have moved it since the batch was read
        Some(p) if p.status == PaymentStatus::Pending => p,
        _ => return Ok(false),
    };

    let payment = send_pending(&mut *tx, deps, &escrow, payment, actor).await?;
    let moved = payment.status == PaymentStatus::Sent;
    if moved {
        close_if_complete(&mut *tx, &escrow, actor).await?;
    }

    tx.commit().await?;
    Ok(moved)
}
