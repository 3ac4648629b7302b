//! Payout executor.
//!
//! Runs inside the caller's transaction with the escrow row already locked.
//! A PSP failure leaves the payment PENDING (milestone PAYING) so a later
//! call with the same key can finish it.

use serde_json::json;
use sqlx::PgConnection;
use tracing::{info, warn};

use crate::common::{AppError, AppResult, EscrowId, MilestoneId, Money};
use crate::domains::audit;
use crate::domains::escrow::models::Escrow;
use crate::domains::milestones::models::{Milestone, MilestoneStatus};
use crate::domains::payments::balance::EscrowBalance;
use crate::domains::payments::models::{Payment, PaymentStatus};
use crate::kernel::deps::PSP_CALL_TIMEOUT;
use crate::kernel::{PayoutRequest, ServerDeps};

/// Deterministic key for a milestone payout.
pub fn payout_key(escrow_id: EscrowId, milestone_id: MilestoneId, amount: Money) -> String {
    format!("pay|escrow:{}|ms:{}|amt:{}", escrow_id, milestone_id, amount)
}

/// Pay `amount` out of `escrow`, optionally against a milestone.
pub async fn execute(
    conn: &mut PgConnection,
    deps: &ServerDeps,
    escrow: &Escrow,
    milestone: Option<&Milestone>,
    amount: Money,
    idempotency_key: &str,
    actor: &str,
) -> AppResult<Payment> {
    if !amount.is_positive() {
        return Err(AppError::invalid_amount("payout amount must be positive"));
    }

    if let Some(existing) = Payment::lock_by_key(idempotency_key, &mut *conn).await? {
        return resume(conn, deps, escrow, existing, amount, idempotency_key, actor).await;
    }

    if let Some(m) = milestone {
        if let Some(prior) = Payment::find_disbursed_for_milestone(m.id, amount, &mut *conn).await? {
            info!(payment_id = %prior.id, milestone_id = %m.id, "Reusing earlier milestone payout");
            return Ok(prior);
        }
    }

    EscrowBalance::load(escrow.id, &mut *conn)
        .await?
        .ensure_covers(amount)?;

    let milestone_id = milestone.map(|m| m.id);
    let payment =
        match Payment::try_insert(escrow.id, milestone_id, amount, idempotency_key, &mut *conn)
            .await?
        {
            Some(p) => p,
            None => {
                // Lost the race on the key; the winner has committed by now.
                let winner = Payment::lock_by_key(idempotency_key, &mut *conn)
                    .await?
                    .ok_or_else(|| AppError::idempotency_key_conflict(idempotency_key))?;
                return resume(conn, deps, escrow, winner, amount, idempotency_key, actor).await;
            }
        };

    if let Some(m) = milestone {
        Milestone::transition(m.id, MilestoneStatus::Approved, MilestoneStatus::Paying, &mut *conn)
            .await?;
    }

    audit::record(
        &mut *conn,
        actor,
        "PAYMENT_CREATED",
        "payment",
        payment.id,
        json!({
            "escrow_id": escrow.id,
            "milestone_id": milestone_id,
            "amount": amount,
            "idempotency_key": idempotency_key,
        }),
    )
    .await?;

    send_pending(conn, deps, escrow, payment, actor).await
}

/// Existing payment under the key: return it or finish sending it.
async fn resume(
    conn: &mut PgConnection,
    deps: &ServerDeps,
    escrow: &Escrow,
    existing: Payment,
    amount: Money,
    idempotency_key: &str,
    actor: &str,
) -> AppResult<Payment> {
    if existing.escrow_id != escrow.id || existing.amount != amount {
        return Err(AppError::idempotency_key_conflict(idempotency_key));
    }
    match existing.status {
        PaymentStatus::Sent | PaymentStatus::Settled => Ok(existing),
        PaymentStatus::Pending => send_pending(conn, deps, escrow, existing, actor).await,
        PaymentStatus::Error | PaymentStatus::Refunded => Err(invalid_payment_state(&existing)),
    }
}

/// Hand a PENDING payment to the PSP and mark it SENT.
///
/// Keeps an already assigned PSP reference. On PSP failure the payment is
/// returned unchanged.
pub async fn send_pending(
    conn: &mut PgConnection,
    deps: &ServerDeps,
    escrow: &Escrow,
    payment: Payment,
    actor: &str,
) -> AppResult<Payment> {
    if payment.status != PaymentStatus::Pending {
        return Err(invalid_payment_state(&payment));
    }

    let psp_ref = match &payment.psp_ref {
        Some(existing) => existing.clone(),
        None => {
            let request = PayoutRequest {
                escrow_id: escrow.id,
                payment_id: payment.id,
                amount: payment.amount,
                currency: escrow.currency,
                idempotency_key: payment
                    .idempotency_key
                    .clone()
                    .unwrap_or_else(|| format!("payment:{}", payment.id)),
            };
            match tokio::time::timeout(PSP_CALL_TIMEOUT, deps.psp.create_payout(&request)).await {
                Ok(Ok(psp_ref)) => psp_ref,
                Ok(Err(e)) => {
                    warn!(payment_id = %payment.id, error = %e, "PSP payout failed; payment left PENDING");
                    return Ok(payment);
                }
                Err(_) => {
                    warn!(payment_id = %payment.id, "PSP payout timed out; payment left PENDING");
                    return Ok(payment);
                }
            }
        }
    };

    let sent = Payment::mark_sent(payment.id, &psp_ref, &mut *conn).await?;

    if let Some(milestone_id) = sent.milestone_id {
        Milestone::transition(milestone_id, MilestoneStatus::Paying, MilestoneStatus::Paid, &mut *conn)
            .await?;
    }

    audit::record(
        &mut *conn,
        actor,
        "PAYMENT_SENT",
        "payment",
        sent.id,
        json!({
            "escrow_id": sent.escrow_id,
            "milestone_id": sent.milestone_id,
            "amount": sent.amount,
            "psp_ref": sent.psp_ref,
        }),
    )
    .await?;

    info!(payment_id = %sent.id, escrow_id = %sent.escrow_id, amount = %sent.amount, "Payout sent");
    Ok(sent)
}

pub(crate) fn invalid_payment_state(payment: &Payment) -> AppError {
    AppError::conflict(
        "INVALID_PAYMENT_STATE",
        format!("payment {} is {}", payment.id, payment.status.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_key_format() {
        let key = payout_key(EscrowId::new(7), MilestoneId::new(12), Money::from_cents(2_500_00));
        assert_eq!(key, "pay|escrow:7|ms:12|amt:2500.00");
    }
}
