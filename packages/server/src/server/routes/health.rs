use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::domains::scheduler::actions::DEFAULT_LEASE;
use crate::domains::scheduler::SchedulerLock;
use crate::kernel::ai::AdvisorStatus;
use crate::kernel::ocr::OcrStatus;
use crate::kernel::ServerDeps;

const DB_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_status: String,
    pub migrations_status: String,
    pub psp_webhook_secret_status: &'static str,
    pub scheduler_running: bool,
    pub scheduler_lock: Option<LockHealth>,
    pub ai: AdvisorStatus,
    pub ocr: OcrStatus,
}

#[derive(Debug, Serialize)]
pub struct LockHealth {
    pub owner: String,
    pub held_by_self: bool,
    pub expires_at: DateTime<Utc>,
}

/// `ok` with a primary secret, `partial` with only the rotation secret.
pub fn webhook_secret_status(primary: bool, next: bool) -> &'static str {
    match (primary, next) {
        (true, _) => "ok",
        (false, true) => "partial",
        (false, false) => "missing",
    }
}

/// Health check endpoint
///
/// Returns 200 while the database answers (the body may still say
/// `degraded`), 503 when it does not.
pub async fn health_handler(State(deps): State<ServerDeps>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = matches!(
        tokio::time::timeout(
            DB_CHECK_TIMEOUT,
            sqlx::query("SELECT 1").execute(&deps.db_pool)
        )
        .await,
        Ok(Ok(_))
    );

    let migrations_status = if db_ok {
        migrations_status(&deps).await
    } else {
        "unknown".to_string()
    };

    let scheduler_lock = if db_ok {
        lock_health(&deps).await
    } else {
        None
    };

    let secrets = deps.config.webhook_secrets("psp");
    let secret_status = webhook_secret_status(secrets.0.is_some(), secrets.1.is_some());

    let healthy = db_ok && migrations_status == "ok" && secret_status == "ok";
    let status_code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            db_status: if db_ok { "ok" } else { "error" }.to_string(),
            migrations_status,
            psp_webhook_secret_status: secret_status,
            scheduler_running: deps.scheduler.is_running(),
            scheduler_lock,
            ai: deps.advisor.status().await,
            ocr: deps.ocr.status().await,
        }),
    )
}

/// `ok` when every bundled migration is applied successfully.
async fn migrations_status(deps: &ServerDeps) -> String {
    let expected = sqlx::migrate!("./migrations").iter().count() as i64;
    let applied: Result<(i64, i64), sqlx::Error> = sqlx::query_as(
        "SELECT COUNT(*) FILTER (WHERE success), COUNT(*) FILTER (WHERE NOT success) FROM _sqlx_migrations",
    )
    .fetch_one(&deps.db_pool)
    .await;

    match applied {
        Ok((ok, 0)) if ok >= expected => "ok".to_string(),
        Ok((_, failed)) if failed > 0 => "failed".to_string(),
        Ok(_) => "pending".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read migration table");
            "unknown".to_string()
        }
    }
}

async fn lock_health(deps: &ServerDeps) -> Option<LockHealth> {
    let mut conn = deps.db_pool.acquire().await.ok()?;
    let lock = SchedulerLock::find(DEFAULT_LEASE, &mut conn).await.ok()??;
    Some(LockHealth {
        held_by_self: lock.owner == deps.scheduler.instance_id,
        owner: lock.owner,
        expires_at: lock.expires_at,
    })
}
