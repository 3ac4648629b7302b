use serde_json::json;
use sqlx::PgConnection;
use tracing::{field, info, instrument, warn};

use crate::common::{AppError, AppResult};
use crate::domains::audit::{self, SYSTEM_ACTOR};
use crate::domains::escrow::actions::{mark_funding_failed, mark_funding_succeeded};
use crate::domains::payments::actions::{finalize_settlement, mark_failed};
use crate::domains::payments::models::{Payment, PaymentStatus};
use crate::domains::webhooks::data::{WebhookAck, WebhookAction, WebhookDelivery, WebhookEnvelope};
use crate::domains::webhooks::models::PspWebhookEvent;
use crate::domains::webhooks::signature;
use crate::kernel::ServerDeps;

const ACTOR: &str = "psp-webhook";

/// Verify, dedupe and apply one PSP webhook.
///
/// The event row and every state change it causes commit together; an error
/// rolls everything back so the PSP retries.
#[instrument(
    skip(delivery, deps),
    fields(provider = field::Empty, event_id = field::Empty, kind = field::Empty)
)]
pub async fn ingest_webhook(delivery: WebhookDelivery, deps: &ServerDeps) -> AppResult<WebhookAck> {
    let now = deps.clock.now();
    let provider = delivery.provider();
    tracing::Span::current().record("provider", provider.as_str());

    let secrets = deps.secrets.webhook_secrets(&provider);
    if secrets.is_empty() {
        return Err(AppError::unavailable(
            "WEBHOOK_SECRET_MISSING",
            format!("no webhook secret configured for provider '{}'", provider),
        ));
    }

    let raw_ts = delivery.timestamp.as_deref();
    signature::check_timestamp(raw_ts, now, deps.config.psp_webhook_max_drift_seconds)?;
    signature::verify(
        &secrets,
        raw_ts.map(str::trim).unwrap_or_default(),
        &delivery.body,
        delivery.signature.as_deref(),
    )?;

    let envelope = WebhookEnvelope::parse(&delivery.body)?;
    let event_id = delivery
        .event_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| envelope.event_id.clone())
        .ok_or_else(|| AppError::bad_request("MISSING_EVENT_ID", "webhook event id is required"))?;
    let psp_ref = delivery
        .psp_ref
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| envelope.psp_ref.clone());

    let span = tracing::Span::current();
    span.record("event_id", event_id.as_str());
    span.record("kind", envelope.kind.as_str());

    let mut tx = deps.db_pool.begin().await?;

    let event = PspWebhookEvent::try_insert(
        &provider,
        &event_id,
        &envelope.kind,
        &envelope.payload,
        psp_ref.as_deref(),
        now,
        &mut *tx,
    )
    .await?
    .ok_or_else(|| {
        AppError::conflict(
            "WEBHOOK_REPLAY",
            format!("event '{}' from '{}' was already received", event_id, provider),
        )
    })?;

    dispatch(
        &mut *tx,
        WebhookAction::from_kind(&envelope.kind),
        psp_ref.as_deref(),
        &envelope,
    )
    .await?;

    PspWebhookEvent::mark_processed(event.id, now, &mut *tx).await?;
    audit::record(
        &mut *tx,
        SYSTEM_ACTOR,
        "WEBHOOK_PROCESSED",
        "psp_webhook_event",
        event.id,
        json!({
            "provider": provider,
            "event_id": event_id,
            "kind": envelope.kind,
            "psp_ref": psp_ref,
        }),
    )
    .await?;
    tx.commit().await?;

    info!("Webhook processed");
    Ok(WebhookAck {
        received: true,
        provider,
        event_id,
        kind: envelope.kind,
    })
}

async fn dispatch(
    conn: &mut PgConnection,
    action: WebhookAction,
    psp_ref: Option<&str>,
    envelope: &WebhookEnvelope,
) -> AppResult<()> {
    match action {
        WebhookAction::Ignored => {}
        WebhookAction::PaymentSettled => {
            let payment = payment_by_ref(conn, require_ref(psp_ref)?).await?;
            if payment.status != PaymentStatus::Settled {
                finalize_settlement(conn, payment.id, ACTOR).await?;
            }
        }
        WebhookAction::PaymentFailed => {
            let payment = match (psp_ref, envelope.payment_key.as_deref()) {
                (Some(psp_ref), _) => payment_by_ref(conn, psp_ref).await?,
                (None, Some(key)) => payment_by_key(conn, key).await?,
                (None, None) => return Err(missing_ref()),
            };
            let reason = envelope.reason.as_deref().unwrap_or("reported failed by PSP");
            if payment.status.is_disbursed() {
                // Money already left the escrow; keep the payment as it is.
                warn!(
                    payment_id = %payment.id,
                    status = payment.status.as_str(),
                    reason,
                    "PSP failure reported for a disbursed payment; status kept"
                );
                audit::record(
                    &mut *conn,
                    ACTOR,
                    "PAYMENT_FAILURE_IGNORED",
                    "payment",
                    payment.id,
                    json!({ "status": payment.status, "reason": reason }),
                )
                .await?;
                return Ok(());
            }
            warn!(payment_id = %payment.id, reason, "PSP reported payment failure");
            mark_failed(conn, payment.id, reason, ACTOR).await?;
        }
        WebhookAction::FundingSucceeded => {
            mark_funding_succeeded(conn, require_ref(psp_ref)?, ACTOR).await?;
        }
        WebhookAction::FundingFailed => {
            mark_funding_failed(conn, require_ref(psp_ref)?, ACTOR).await?;
        }
    }
    Ok(())
}

fn require_ref(psp_ref: Option<&str>) -> AppResult<&str> {
    psp_ref.ok_or_else(missing_ref)
}

fn missing_ref() -> AppError {
    AppError::bad_request("INVALID_PAYLOAD", "webhook does not name a PSP reference")
}

fn payment_not_found(what: &str) -> AppError {
    AppError::not_found("PAYMENT_NOT_FOUND", format!("no payment with {}", what))
}

async fn payment_by_ref(conn: &mut PgConnection, psp_ref: &str) -> AppResult<Payment> {
    Payment::find_by_psp_ref(psp_ref, &mut *conn)
        .await?
        .ok_or_else(|| payment_not_found(&format!("PSP reference '{}'", psp_ref)))
}

async fn payment_by_key(conn: &mut PgConnection, key: &str) -> AppResult<Payment> {
    Payment::find_by_key(key, &mut *conn)
        .await?
        .ok_or_else(|| payment_not_found(&format!("payment key '{}'", key)))
}
