//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! A single repeated job drives the maintenance pass. Every instance runs the
//! job; the database lease decides which one does the work.
//!
//! ```text
//! Scheduler (every SCHEDULER_TICK_SECONDS)
//!     │
//!     └─► run_tick()
//!             ├─► try_acquire("default")  (skip tick if held elsewhere)
//!             ├─► expire_mandates()
//!             └─► check_deadline() for each FUNDED escrow past deadline
//! ```

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::scheduler::actions::{release, run_tick, DEFAULT_LEASE};
use crate::kernel::ServerDeps;

/// Start all scheduled tasks
pub async fn start_scheduler(deps: ServerDeps) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let tick = deps.config.scheduler_tick;

    let tick_deps = deps.clone();
    let tick_job = Job::new_repeated_async(tick, move |_uuid, _lock| {
        let deps = tick_deps.clone();
        Box::pin(async move {
            match run_tick(&deps).await {
                Ok(report) if !report.lease_held => {
                    tracing::debug!("Scheduler lease held by another instance, skipping tick");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Scheduler tick failed"),
            }
        })
    })?;

    scheduler.add(tick_job).await?;
    scheduler.start().await?;
    deps.scheduler.set_running(true);

    tracing::info!(
        tick_seconds = tick.as_secs(),
        instance_id = %deps.scheduler.instance_id,
        "Scheduled tasks started"
    );
    Ok(scheduler)
}

/// Stop the job scheduler and hand the lease back.
pub async fn stop_scheduler(mut scheduler: JobScheduler, deps: &ServerDeps) -> Result<()> {
    scheduler.shutdown().await?;
    deps.scheduler.set_running(false);
    if let Err(e) = release(DEFAULT_LEASE, &deps.scheduler.instance_id, deps).await {
        tracing::warn!(error = %e, "Failed to release scheduler lease");
    }
    Ok(())
}
