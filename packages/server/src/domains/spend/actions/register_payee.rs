use anyhow::Context;
use serde_json::json;
use tracing::info;

use crate::common::utils::fingerprint::request_fingerprint;
use crate::common::{AppError, AppResult, Principal};
use crate::domains::audit;
use crate::domains::escrow::actions::escrow_not_found;
use crate::domains::escrow::models::Escrow;
use crate::domains::idempotency::{self, Claim};
use crate::domains::spend::data::{AllowedPayeeData, RegisterPayeeRequest};
use crate::domains::spend::models::AllowedPayee;
use crate::kernel::ServerDeps;

const SCOPE: &str = "allowed_payees";

pub async fn register_payee(
    request: RegisterPayeeRequest,
    idempotency_key: Option<&str>,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<AllowedPayeeData> {
    let key = idempotency::require_key(idempotency_key)?;
    request.validate()?;
    let fingerprint = request_fingerprint(&request);
    let today = deps.clock.now().date_naive();

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
        let replay: AllowedPayeeData =
            serde_json::from_value(stored).context("stored payee response is unreadable")?;
        return Ok(replay);
    }

    let escrow = Escrow::lock(request.escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| escrow_not_found(request.escrow_id))?;
    if escrow.status.is_terminal() {
        return Err(AppError::invalid_escrow_state(format!(
            "escrow {} is {}",
            escrow.id,
            escrow.status.as_str()
        )));
    }

    let payee = AllowedPayee::create(
        escrow.id,
        request.payee_ref.trim(),
        request.label.trim(),
        request.daily_limit,
        request.total_limit,
        today,
        &mut *tx,
    )
    .await?
    .ok_or_else(|| {
        AppError::conflict(
            "PAYEE_ALREADY_REGISTERED",
            format!("payee '{}' is already registered on this escrow", request.payee_ref.trim()),
        )
    })?;

    audit::record(
        &mut *tx,
        &principal.actor(),
        "PAYEE_REGISTERED",
        "allowed_payee",
        payee.id,
        json!({
            "escrow_id": payee.escrow_id,
            "payee_ref": payee.payee_ref,
            "daily_limit": payee.daily_limit,
            "total_limit": payee.total_limit,
        }),
    )
    .await?;

    let data = AllowedPayeeData::from(payee);
    idempotency::complete(
        &mut *tx,
        SCOPE,
        &key,
        &serde_json::to_value(&data).context("serialize payee")?,
    )
    .await?;
    tx.commit().await?;

    info!(payee_id = %data.id, escrow_id = %data.escrow_id, "Payee registered");
    Ok(data)
}
