use anyhow::Context;
use serde_json::json;
use tracing::{info, instrument};

use crate::common::utils::fingerprint::request_fingerprint;
use crate::common::{AppError, AppResult, Principal};
use crate::domains::audit;
use crate::domains::escrow::actions::escrow_not_found;
use crate::domains::escrow::models::{Escrow, EscrowStatus};
use crate::domains::idempotency::{self, Claim};
use crate::domains::payments::actions::execute;
use crate::domains::payments::data::PaymentData;
use crate::domains::spend::data::{AllowedPayeeData, SpendData, SpendRequest};
use crate::domains::spend::models::AllowedPayee;
use crate::kernel::ServerDeps;

const SCOPE: &str = "spend";

/// Pay a registered payee straight out of a funded escrow, within the
/// payee's daily and total caps.
#[instrument(skip(request, idempotency_key, principal, deps), fields(escrow_id = %request.escrow_id, payee_ref = %request.payee_ref))]
pub async fn spend(
    request: SpendRequest,
    idempotency_key: Option<&str>,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<SpendData> {
    let key = idempotency::require_key(idempotency_key)?;
    request.validate()?;
    let fingerprint = request_fingerprint(&request);
    let today = deps.clock.now().date_naive();
    let actor = principal.actor();
    let payee_ref = request.payee_ref.trim();

    let mut tx = deps.db_pool.begin().await?;

    if let Claim::Replay(stored) = idempotency::claim(
        &mut *tx,
        SCOPE,
        &key,
        &fingerprint,
        deps.config.idempotency_mismatch_policy,
    )
    .await?
    {
        let replay: SpendData =
            serde_json::from_value(stored).context("stored spend response is unreadable")?;
        return Ok(replay);
    }

    let escrow = Escrow::lock(request.escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| escrow_not_found(request.escrow_id))?;
    if !matches!(escrow.status, EscrowStatus::Funded | EscrowStatus::Releasable) {
        return Err(AppError::invalid_escrow_state(format!(
            "escrow {} is {}",
            escrow.id,
            escrow.status.as_str()
        )));
    }

    let payee = AllowedPayee::lock_by_ref(escrow.id, payee_ref, &mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::not_found(
                "PAYEE_NOT_FOUND",
                format!("payee '{}' is not registered on escrow {}", payee_ref, escrow.id),
            )
        })?;
    payee.check_limits(request.amount, today)?;

    let payment = execute(&mut *tx, deps, &escrow, None, request.amount, &key, &actor).await?;
    let payee = AllowedPayee::record_spend(payee.id, request.amount, today, &mut *tx).await?;

    audit::record(
        &mut *tx,
        &actor,
        "USAGE_SPENT",
        "allowed_payee",
        payee.id,
        json!({
            "escrow_id": escrow.id,
            "payment_id": payment.id,
            "amount": request.amount,
            "spent_today": payee.spent_today,
            "spent_total": payee.spent_total,
            "note": request.note,
        }),
    )
    .await?;

    let data = SpendData {
        payment: PaymentData::from(payment),
        payee: AllowedPayeeData::from(payee),
    };
    idempotency::complete(
        &mut *tx,
        SCOPE,
        &key,
        &serde_json::to_value(&data).context("serialize spend")?,
    )
    .await?;
    tx.commit().await?;

    info!(
        payment_id = %data.payment.id,
        status = data.payment.status.as_str(),
        "Usage spend disbursed"
    );
    Ok(data)
}
