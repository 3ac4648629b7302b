use anyhow::Context;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

use crate::common::AppResult;
use crate::domains::scheduler::models::SchedulerLock;
use crate::kernel::ServerDeps;

/// Name of the single lease all instances compete for.
pub const DEFAULT_LEASE: &str = "default";

fn lease_expiry(now: DateTime<Utc>, ttl: Duration) -> anyhow::Result<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl).context("scheduler lease TTL is out of range")?;
    Ok(now + ttl)
}

/// Take or keep the lease `name` for `owner`.
///
/// Returns true when `owner` holds the lease afterwards: the row was absent,
/// had expired, or already belonged to `owner` (refreshed).
pub async fn try_acquire(
    name: &str,
    owner: &str,
    ttl: Duration,
    deps: &ServerDeps,
) -> AppResult<bool> {
    let now = deps.clock.now();
    let expires_at = lease_expiry(now, ttl)?;
    let mut tx = deps.db_pool.begin().await?;

    let held = match SchedulerLock::find_for_update(name, &mut *tx).await? {
        None => SchedulerLock::try_insert(name, owner, now, expires_at, &mut *tx)
            .await?
            .is_some(),
        Some(lock) if lock.owner == owner => {
            SchedulerLock::refresh(name, owner, expires_at, &mut *tx).await?
        }
        Some(lock) if lock.is_expired(now) => {
            info!(lease = name, previous_owner = %lock.owner, "Taking over expired scheduler lease");
            SchedulerLock::take_over(name, owner, now, expires_at, &mut *tx).await?;
            true
        }
        Some(lock) => {
            debug!(lease = name, holder = %lock.owner, "Scheduler lease held elsewhere");
            false
        }
    };

    tx.commit().await?;
    Ok(held)
}

pub async fn refresh(name: &str, owner: &str, ttl: Duration, deps: &ServerDeps) -> AppResult<bool> {
    let expires_at = lease_expiry(deps.clock.now(), ttl)?;
    let mut conn = deps.db_pool.acquire().await?;
    Ok(SchedulerLock::refresh(name, owner, expires_at, &mut conn).await?)
}

pub async fn release(name: &str, owner: &str, deps: &ServerDeps) -> AppResult<bool> {
    let mut conn = deps.db_pool.acquire().await?;
    let released = SchedulerLock::release(name, owner, &mut conn).await?;
    if released {
        info!(lease = name, owner, "Scheduler lease released");
    }
    Ok(released)
}
