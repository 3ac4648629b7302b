use serde::Serialize;
use tracing::{error, info};

use crate::common::AppResult;
use crate::domains::audit::SYSTEM_ACTOR;
use crate::domains::escrow::actions::check_deadline;
use crate::domains::escrow::models::{Escrow, EscrowStatus};
use crate::domains::mandates::actions::expire_mandates;
use crate::domains::payments::actions::retry_pending_payouts;
use crate::domains::scheduler::actions::lease::{try_acquire, DEFAULT_LEASE};
use crate::kernel::ServerDeps;

/// Escrows examined per tick.
const DEADLINE_BATCH: i64 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub lease_held: bool,
    pub mandates_expired: usize,
    pub payouts_sent: usize,
    pub deadlines_released: usize,
}

/// One scheduler pass: expire due mandates, retry PENDING payouts, then
/// release FUNDED escrows whose deadline has passed. Does nothing unless
/// this instance holds the lease.
pub async fn run_tick(deps: &ServerDeps) -> AppResult<TickReport> {
    let owner = deps.scheduler.instance_id.as_str();
    let ttl = deps.config.scheduler_lock_ttl;
    if !try_acquire(DEFAULT_LEASE, owner, ttl, deps).await? {
        return Ok(TickReport::default());
    }

    let mandates_expired = expire_mandates(SYSTEM_ACTOR, deps).await?;
    let payouts_sent = retry_pending_payouts(SYSTEM_ACTOR, deps).await?;

    let due = {
        let mut conn = deps.db_pool.acquire().await?;
        Escrow::find_deadline_due(deps.clock.now(), DEADLINE_BATCH, &mut conn).await?
    };
    let mut deadlines_released = 0;
    for escrow_id in due {
        // One failing escrow must not stall the rest of the batch.
        match check_deadline(escrow_id, SYSTEM_ACTOR, deps).await {
            Ok(escrow) if escrow.status == EscrowStatus::Released => deadlines_released += 1,
            Ok(_) => {}
            Err(e) => error!(escrow_id = %escrow_id, error = %e, "Deadline check failed"),
        }
    }

    if mandates_expired > 0 || payouts_sent > 0 || deadlines_released > 0 {
        info!(mandates_expired, payouts_sent, deadlines_released, "Scheduler tick complete");
    }
    Ok(TickReport {
        lease_held: true,
        mandates_expired,
        payouts_sent,
        deadlines_released,
    })
}
