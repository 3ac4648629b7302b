use tracing::info;

use super::executor::{invalid_payment_state, send_pending};
use super::settlement::{close_if_complete, finalize_settlement};
use crate::common::{AppError, AppResult, PaymentId, Principal};
use crate::domains::escrow::models::Escrow;
use crate::domains::payments::models::{Payment, PaymentStatus};
use crate::kernel::ServerDeps;

/// Push an existing payment forward by one step.
///
/// PENDING is sent to the PSP, SENT is settled, SETTLED is returned as is.
pub async fn execute_payment(
    payment_id: PaymentId,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<Payment> {
    let actor = principal.actor();
    let mut tx = deps.db_pool.begin().await?;

    let payment = Payment::find_by_id(payment_id, &mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("PAYMENT_NOT_FOUND", "payment not found"))?;
    let escrow = Escrow::lock(payment.escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("ESCROW_NOT_FOUND", "escrow not found"))?;
    let payment = Payment::lock_by_id(payment_id, &mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("PAYMENT_NOT_FOUND", "payment not found"))?;

    let result = match payment.status {
        PaymentStatus::Pending => {
            let sent = send_pending(&mut *tx, deps, &escrow, payment, &actor).await?;
            if sent.status == PaymentStatus::Sent {
                close_if_complete(&mut *tx, &escrow, &actor).await?;
            }
            sent
        }
        PaymentStatus::Sent => finalize_settlement(&mut *tx, payment_id, &actor).await?,
        PaymentStatus::Settled => payment,
        PaymentStatus::Error | PaymentStatus::Refunded => {
            return Err(invalid_payment_state(&payment))
        }
    };

    tx.commit().await?;

    info!(payment_id = %result.id, status = result.status.as_str(), "Payment executed");
    Ok(result)
}
