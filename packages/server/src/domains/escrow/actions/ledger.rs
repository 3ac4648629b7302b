//! Escrow ledger use cases: creation, deposits and lifecycle transitions.

use serde_json::{json, Value as JsonValue};
use sqlx::PgConnection;
use tracing::info;

use crate::common::{AppError, AppResult, EscrowId, Money, Principal};
use crate::domains::audit;
use crate::domains::escrow::data::{CreateEscrowRequest, DeliveryRequest, EscrowView};
use crate::domains::escrow::machines::{next_status, status_after_deposit, EscrowEvent};
use crate::domains::escrow::models::{
    Escrow, EscrowDeposit, EscrowEvent as EscrowEventRow, EscrowEventKind, EscrowStatus,
};
use crate::domains::idempotency;
use crate::domains::milestones::models::Milestone;
use crate::domains::payments::models::{Payment, PaymentStatus};
use crate::domains::payments::EscrowBalance;
use crate::domains::users::User;
use crate::kernel::ServerDeps;

/// Result of applying a deposit.
#[derive(Debug, Clone)]
pub struct DepositOutcome {
    pub escrow: Escrow,
    pub deposit: EscrowDeposit,
    pub replayed: bool,
}

pub(crate) fn escrow_not_found(id: EscrowId) -> AppError {
    AppError::not_found("ESCROW_NOT_FOUND", format!("escrow {} not found", id))
}

/// Create a DRAFT escrow between two existing users.
pub async fn create_escrow(
    request: CreateEscrowRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<Escrow> {
    let currency = request.validate()?;

    let mut tx = deps.db_pool.begin().await?;

    for user_id in [request.client_id, request.provider_id] {
        if !User::exists(user_id, &mut *tx).await? {
            return Err(AppError::not_found(
                "USER_NOT_FOUND",
                format!("user {} not found", user_id),
            ));
        }
    }

    let conditions = request.release_conditions.unwrap_or_else(|| json!({}));
    let escrow = Escrow::create(
        request.client_id,
        request.provider_id,
        request.amount_total,
        currency,
        request.domain.unwrap_or_default(),
        &conditions,
        request.deadline_at,
        &mut *tx,
    )
    .await?;

    audit::record(
        &mut *tx,
        &principal.actor(),
        "ESCROW_CREATED",
        "escrow",
        escrow.id,
        json!({
            "client_id": escrow.client_id,
            "provider_id": escrow.provider_id,
            "amount_total": escrow.amount_total,
            "currency": escrow.currency,
            "domain": escrow.domain,
            "deadline_at": escrow.deadline_at,
        }),
    )
    .await?;

    tx.commit().await?;

    info!(escrow_id = %escrow.id, amount = %escrow.amount_total, currency = %escrow.currency, "Escrow created");
    Ok(escrow)
}

/// Record a deposit under a client-supplied idempotency key.
pub async fn deposit(
    escrow_id: EscrowId,
    amount: Money,
    idempotency_key: Option<&str>,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<DepositOutcome> {
    let key = idempotency::require_key(idempotency_key)?;

    let mut tx = deps.db_pool.begin().await?;
    let outcome = apply_deposit(&mut *tx, escrow_id, amount, &key, &principal.actor()).await?;
    tx.commit().await?;

    if !outcome.replayed {
        info!(
            escrow_id = %escrow_id,
            amount = %amount,
            status = outcome.escrow.status.as_str(),
            "Deposit recorded"
        );
    }
    Ok(outcome)
}

/// Deposit inside the caller's transaction. Also used by PSP funding.
pub async fn apply_deposit(
    conn: &mut PgConnection,
    escrow_id: EscrowId,
    amount: Money,
    key: &str,
    actor: &str,
) -> AppResult<DepositOutcome> {
    let key = idempotency::require_key(Some(key))?;
    if !amount.is_positive() {
        return Err(AppError::invalid_amount("deposit amount must be positive"));
    }

    if let Some(existing) = EscrowDeposit::find_by_key(&key, &mut *conn).await? {
        return replay_deposit(conn, existing, escrow_id, amount, &key).await;
    }

    let escrow = Escrow::lock(escrow_id, &mut *conn)
        .await?
        .ok_or_else(|| escrow_not_found(escrow_id))?;
    if escrow.status.is_terminal() {
        return Err(AppError::invalid_escrow_state(format!(
            "cannot deposit into a {} escrow",
            escrow.status.as_str()
        )));
    }

    let deposit = match EscrowDeposit::try_insert(escrow_id, amount, &key, &mut *conn).await? {
        Some(d) => d,
        None => {
            let existing = EscrowDeposit::find_by_key(&key, &mut *conn)
                .await?
                .ok_or_else(|| AppError::idempotency_key_conflict(&key))?;
            return replay_deposit(conn, existing, escrow_id, amount, &key).await;
        }
    };

    let deposited = EscrowDeposit::total_for_escrow(escrow_id, &mut *conn).await?;
    let target = status_after_deposit(escrow.status, deposited, escrow.amount_total);
    let escrow = if target != escrow.status {
        Escrow::set_status(escrow_id, target, &mut *conn).await?
    } else {
        escrow
    };

    EscrowEventRow::append(
        escrow_id,
        EscrowEventKind::Deposit,
        &json!({ "amount": amount, "deposited": deposited, "status": escrow.status }),
        Some(&key),
        &mut *conn,
    )
    .await?;
    audit::record(
        &mut *conn,
        actor,
        "DEPOSIT_RECEIVED",
        "escrow",
        escrow_id,
        json!({
            "deposit_id": deposit.id,
            "amount": amount,
            "deposited": deposited,
            "status": escrow.status,
        }),
    )
    .await?;

    Ok(DepositOutcome {
        escrow,
        deposit,
        replayed: false,
    })
}

async fn replay_deposit(
    conn: &mut PgConnection,
    existing: EscrowDeposit,
    escrow_id: EscrowId,
    amount: Money,
    key: &str,
) -> AppResult<DepositOutcome> {
    if existing.escrow_id != escrow_id || existing.amount != amount {
        return Err(AppError::idempotency_key_conflict(key));
    }
    let escrow = Escrow::find_by_id(escrow_id, &mut *conn)
        .await?
        .ok_or_else(|| escrow_not_found(escrow_id))?;
    Ok(DepositOutcome {
        escrow,
        deposit: existing,
        replayed: true,
    })
}

/// Apply a lifecycle event to a locked escrow and log it.
async fn apply_event(
    conn: &mut PgConnection,
    escrow: &Escrow,
    event: EscrowEvent,
    kind: EscrowEventKind,
    data: JsonValue,
    actor: &str,
) -> AppResult<Escrow> {
    let to = next_status(escrow.status, event).ok_or_else(|| {
        AppError::invalid_escrow_state(format!(
            "{:?} is not allowed while the escrow is {}",
            event,
            escrow.status.as_str()
        ))
    })?;

    let updated = Escrow::set_status(escrow.id, to, &mut *conn).await?;
    EscrowEventRow::append(escrow.id, kind, &data, None, &mut *conn).await?;
    audit::record(
        &mut *conn,
        actor,
        &format!("ESCROW_{}", kind.as_str()),
        "escrow",
        escrow.id,
        json!({ "from": escrow.status, "to": to, "data": data }),
    )
    .await?;

    info!(escrow_id = %escrow.id, from = escrow.status.as_str(), to = to.as_str(), "Escrow transition");
    Ok(updated)
}

async fn transition(
    escrow_id: EscrowId,
    event: EscrowEvent,
    kind: EscrowEventKind,
    data: JsonValue,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<Escrow> {
    let mut tx = deps.db_pool.begin().await?;
    let escrow = Escrow::lock(escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| escrow_not_found(escrow_id))?;
    let updated = apply_event(&mut *tx, &escrow, event, kind, data, &principal.actor()).await?;
    tx.commit().await?;
    Ok(updated)
}

/// Provider reports delivery. FUNDED or RELEASABLE → RELEASABLE.
pub async fn mark_delivered(
    escrow_id: EscrowId,
    request: DeliveryRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<Escrow> {
    transition(
        escrow_id,
        EscrowEvent::MarkDelivered,
        EscrowEventKind::ProofUploaded,
        json!({ "note": request.note, "proof_url": request.proof_url }),
        principal,
        deps,
    )
    .await
}

/// RELEASABLE → RELEASED.
pub async fn client_approve(
    escrow_id: EscrowId,
    request: DeliveryRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<Escrow> {
    transition(
        escrow_id,
        EscrowEvent::ClientApprove,
        EscrowEventKind::ClientApproved,
        json!({ "note": request.note }),
        principal,
        deps,
    )
    .await
}

/// RELEASABLE → FUNDED.
pub async fn client_reject(
    escrow_id: EscrowId,
    request: DeliveryRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<Escrow> {
    transition(
        escrow_id,
        EscrowEvent::ClientReject,
        EscrowEventKind::ClientRejected,
        json!({ "note": request.note }),
        principal,
        deps,
    )
    .await
}

/// Release a FUNDED escrow whose deadline has passed. Anything else is
/// returned unchanged.
pub async fn check_deadline(
    escrow_id: EscrowId,
    actor: &str,
    deps: &ServerDeps,
) -> AppResult<Escrow> {
    let now = deps.clock.now();
    let mut tx = deps.db_pool.begin().await?;

    let escrow = Escrow::lock(escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| escrow_not_found(escrow_id))?;

    if escrow.status != EscrowStatus::Funded || escrow.deadline_at > now {
        return Ok(escrow);
    }

    let released = apply_event(
        &mut *tx,
        &escrow,
        EscrowEvent::DeadlineRelease,
        EscrowEventKind::DeadlineApproved,
        json!({ "deadline_at": escrow.deadline_at, "checked_at": now }),
        actor,
    )
    .await?;
    tx.commit().await?;
    Ok(released)
}

/// DRAFT escrow that never received money → CANCELLED.
pub async fn cancel(escrow_id: EscrowId, principal: &Principal, deps: &ServerDeps) -> AppResult<Escrow> {
    let mut tx = deps.db_pool.begin().await?;
    let escrow = Escrow::lock(escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| escrow_not_found(escrow_id))?;

    if EscrowDeposit::count_for_escrow(escrow_id, &mut *tx).await? > 0 {
        return Err(AppError::invalid_escrow_state(
            "escrow has deposits and cannot be cancelled",
        ));
    }

    let cancelled = apply_event(
        &mut *tx,
        &escrow,
        EscrowEvent::Cancel,
        EscrowEventKind::Cancelled,
        json!({}),
        &principal.actor(),
    )
    .await?;
    tx.commit().await?;
    Ok(cancelled)
}

/// Return funds of an escrow that has not paid anything out → REFUNDED.
pub async fn refund(escrow_id: EscrowId, principal: &Principal, deps: &ServerDeps) -> AppResult<Escrow> {
    let mut tx = deps.db_pool.begin().await?;
    let escrow = Escrow::lock(escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| escrow_not_found(escrow_id))?;

    let outstanding = Payment::count_with_status(
        escrow_id,
        &[PaymentStatus::Pending, PaymentStatus::Sent, PaymentStatus::Settled],
        &mut *tx,
    )
    .await?;
    if outstanding > 0 {
        return Err(AppError::invalid_escrow_state(
            "escrow has payouts and cannot be refunded",
        ));
    }

    let balance = EscrowBalance::load(escrow_id, &mut *tx).await?;
    let refunded = apply_event(
        &mut *tx,
        &escrow,
        EscrowEvent::Refund,
        EscrowEventKind::Refunded,
        json!({ "amount": balance.available() }),
        &principal.actor(),
    )
    .await?;
    tx.commit().await?;
    Ok(refunded)
}

/// Escrow with balances, milestones and payments.
pub async fn view(escrow_id: EscrowId, deps: &ServerDeps) -> AppResult<EscrowView> {
    let mut conn = deps.db_pool.acquire().await?;

    let escrow = Escrow::find_by_id(escrow_id, &mut *conn)
        .await?
        .ok_or_else(|| escrow_not_found(escrow_id))?;
    let balance = EscrowBalance::load(escrow_id, &mut *conn).await?;
    let milestones = Milestone::list_for_escrow(escrow_id, &mut *conn).await?;
    let payments = Payment::list_for_escrow(escrow_id, &mut *conn).await?;

    Ok(EscrowView {
        escrow: escrow.into(),
        deposited: balance.deposited,
        paid_out: balance.disbursed,
        reserved: balance.reserved,
        available: balance.available(),
        milestones: milestones.into_iter().map(Into::into).collect(),
        payments: payments.into_iter().map(Into::into).collect(),
    })
}
