use sqlx::PgConnection;

use crate::common::AppResult;
use crate::domains::escrow::models::Escrow;
use crate::domains::milestones::models::Milestone;
use crate::domains::payments::actions::{close_if_complete, execute, payout_key};
use crate::domains::payments::models::{Payment, PaymentStatus};
use crate::kernel::ServerDeps;

/// Pay out an APPROVED milestone and close the escrow if it was the last one.
pub(super) async fn release_milestone(
    conn: &mut PgConnection,
    deps: &ServerDeps,
    escrow: &Escrow,
    milestone: &Milestone,
    actor: &str,
) -> AppResult<Payment> {
    let key = payout_key(escrow.id, milestone.id, milestone.amount);
    let payment = execute(conn, deps, escrow, Some(milestone), milestone.amount, &key, actor).await?;
    if payment.status == PaymentStatus::Sent {
        close_if_complete(conn, escrow, actor).await?;
    }
    Ok(payment)
}
