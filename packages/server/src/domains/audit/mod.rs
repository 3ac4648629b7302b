//! Audit domain - append-only log of every state transition.
//!
//! Entries are written through [`record`] inside the caller's transaction so
//! an audit row exists iff the change it describes was committed.

pub mod models;
pub mod sanitize;

use anyhow::Result;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use std::fmt::Display;

pub use models::audit_log::AuditLog;
pub use sanitize::sanitize_payload;

/// Actor label used for work the system does on its own (scheduler, webhooks).
pub const SYSTEM_ACTOR: &str = "system";

/// Sanitize `data` and append an audit entry.
pub async fn record(
    conn: &mut PgConnection,
    actor: &str,
    action: &str,
    entity_kind: &str,
    entity_id: impl Display,
    data: JsonValue,
) -> Result<AuditLog> {
    let clean = sanitize_payload(&data);
    AuditLog::insert(actor, action, entity_kind, &entity_id.to_string(), &clean, conn).await
}
