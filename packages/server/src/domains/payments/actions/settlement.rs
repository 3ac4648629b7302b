use serde_json::json;
use sqlx::PgConnection;
use tracing::info;

use super::executor::invalid_payment_state;
use crate::common::{AppError, AppResult, PaymentId};
use crate::domains::audit;
use crate::domains::escrow::machines::{next_status, EscrowEvent};
use crate::domains::escrow::models::{Escrow, EscrowEvent as EscrowEventRow, EscrowEventKind};
use crate::domains::milestones::models::Milestone;
use crate::domains::payments::models::{Payment, PaymentStatus};

/// SENT → SETTLED, then close the escrow if every milestone is paid.
///
/// Settling an already SETTLED payment is a no-op.
pub async fn finalize_settlement(
    conn: &mut PgConnection,
    payment_id: PaymentId,
    actor: &str,
) -> AppResult<Payment> {
    let (escrow, payment) = lock_payment(conn, payment_id).await?;

    let payment = match payment.status {
        PaymentStatus::Settled => return Ok(payment),
        PaymentStatus::Sent => {
            let settled = Payment::set_status(payment.id, PaymentStatus::Settled, &mut *conn).await?;
            audit::record(
                &mut *conn,
                actor,
                "PAYMENT_SETTLED",
                "payment",
                settled.id,
                json!({
                    "escrow_id": settled.escrow_id,
                    "amount": settled.amount,
                    "psp_ref": settled.psp_ref,
                }),
            )
            .await?;
            info!(payment_id = %settled.id, "Payment settled");
            settled
        }
        _ => return Err(invalid_payment_state(&payment)),
    };

    close_if_complete(conn, &escrow, actor).await?;
    Ok(payment)
}

/// PENDING → ERROR after the PSP reported a failure.
///
/// An ERROR payment is returned as is. Disbursed payments (SENT, SETTLED)
/// cannot fail any more.
pub async fn mark_failed(
    conn: &mut PgConnection,
    payment_id: PaymentId,
    reason: &str,
    actor: &str,
) -> AppResult<Payment> {
    let (_, payment) = lock_payment(conn, payment_id).await?;

    match payment.status {
        PaymentStatus::Error => Ok(payment),
        PaymentStatus::Pending => {
            let failed = Payment::set_status(payment.id, PaymentStatus::Error, &mut *conn).await?;
            audit::record(
                &mut *conn,
                actor,
                "PAYMENT_FAILED",
                "payment",
                failed.id,
                json!({
                    "escrow_id": failed.escrow_id,
                    "reason": reason,
                }),
            )
            .await?;
            info!(payment_id = %failed.id, "Payment marked failed");
            Ok(failed)
        }
        _ => Err(invalid_payment_state(&payment)),
    }
}

/// Release the escrow once all of its milestones are PAID.
///
/// Returns true when the escrow was closed by this call.
pub async fn close_if_complete(
    conn: &mut PgConnection,
    escrow: &Escrow,
    actor: &str,
) -> AppResult<bool> {
    let Some(next) = next_status(escrow.status, EscrowEvent::Close) else {
        return Ok(false);
    };
    if !Milestone::all_paid(escrow.id, &mut *conn).await? {
        return Ok(false);
    }

    Escrow::set_status(escrow.id, next, &mut *conn).await?;
    EscrowEventRow::append(
        escrow.id,
        EscrowEventKind::Closed,
        &json!({ "from": escrow.status, "reason": "all milestones paid" }),
        None,
        &mut *conn,
    )
    .await?;
    audit::record(
        &mut *conn,
        actor,
        "ESCROW_CLOSED",
        "escrow",
        escrow.id,
        json!({ "from": escrow.status, "to": next }),
    )
    .await?;

    info!(escrow_id = %escrow.id, "Escrow closed after final milestone payout");
    Ok(true)
}

/// Escrow lock first, then the payment row.
async fn lock_payment(conn: &mut PgConnection, payment_id: PaymentId) -> AppResult<(Escrow, Payment)> {
    let payment = Payment::find_by_id(payment_id, &mut *conn)
        .await?
        .ok_or_else(payment_not_found)?;
    let escrow = Escrow::lock(payment.escrow_id, &mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("ESCROW_NOT_FOUND", "escrow not found"))?;
    let payment = Payment::lock_by_id(payment_id, &mut *conn)
        .await?
        .ok_or_else(payment_not_found)?;
    Ok((escrow, payment))
}

fn payment_not_found() -> AppError {
    AppError::not_found("PAYMENT_NOT_FOUND", "payment not found")
}
