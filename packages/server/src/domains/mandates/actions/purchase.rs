use anyhow::Context;
use serde_json::json;
use tracing::{info, instrument};

use crate::common::utils::fingerprint::request_fingerprint;
use crate::common::{AppError, AppResult, Principal};
use crate::domains::audit;
use crate::domains::idempotency::{self, Claim};
use crate::domains::mandates::data::{PurchaseData, PurchaseRequest};
use crate::domains::mandates::models::{AllowlistEntry, Merchant, Purchase, UsageMandate};
use crate::kernel::ServerDeps;

const SCOPE: &str = "purchases";

/// Charge a purchase against the sender's mandate for the beneficiary.
///
/// The spend itself is one conditional UPDATE, so concurrent purchases can
/// never push a mandate past its total.
#[instrument(skip(request, idempotency_key, principal, deps), fields(sender_id = %request.sender_id, merchant_id = %request.merchant_id))]
pub async fn purchase(
    request: PurchaseRequest,
    idempotency_key: Option<&str>,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<PurchaseData> {
    let key = idempotency::require_key(idempotency_key)?;
    let currency = request.validate()?;
    let beneficiary_id = request
        .beneficiary_id
        .or(principal.user_id)
        .ok_or_else(|| AppError::bad_request("INVALID_PAYLOAD", "beneficiary_id is required"))?;
    let fingerprint = request_fingerprint(&request);
    let now = deps.clock.now();
    let actor = principal.actor();

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
        let replay: PurchaseData =
            serde_json::from_value(stored).context("stored purchase response is unreadable")?;
        return Ok(replay);
    }

    let merchant = Merchant::find_by_id(request.merchant_id, &mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::not_found(
                "MERCHANT_NOT_FOUND",
                format!("merchant {} not found", request.merchant_id),
            )
        })?;

    let mandate = UsageMandate::find_active(request.sender_id, beneficiary_id, currency, now, &mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::forbidden(
                "MANDATE_REQUIRED",
                "no active mandate covers this sender, beneficiary and currency",
            )
        })?;

    if let Some(allowed) = mandate.allowed_merchant_id {
        if allowed != merchant.id {
            return Err(AppError::forbidden(
                "MANDATE_MERCHANT_FORBIDDEN",
                "the mandate is restricted to another merchant",
            ));
        }
    }
    if let Some(allowed) = &mandate.allowed_category {
        if !allowed.eq_ignore_ascii_case(&merchant.category) {
            return Err(AppError::forbidden(
                "MANDATE_CATEGORY_FORBIDDEN",
                format!("the mandate only covers '{}'", allowed),
            ));
        }
    }

    let permitted = merchant.is_certified
        || AllowlistEntry::permits(beneficiary_id, merchant.id, &merchant.category, &mut *tx).await?;
    if !permitted {
        return Err(AppError::forbidden(
            "UNAUTHORIZED_USAGE",
            "merchant is neither certified nor allowlisted for this beneficiary",
        ));
    }

    let mandate = UsageMandate::consume(mandate.id, request.amount, now, &mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::conflict(
                "MANDATE_CONFLICT",
                "mandate limit reached or mandate no longer active",
            )
        })?;

    let purchase = Purchase::create(
        mandate.id,
        request.sender_id,
        beneficiary_id,
        merchant.id,
        &merchant.category,
        request.amount,
        currency,
        &key,
        &mut *tx,
    )
    .await?;

    audit::record(
        &mut *tx,
        &actor,
        "MANDATE_CONSUMED",
        "mandate",
        mandate.id,
        json!({
            "purchase_id": purchase.id,
            "merchant_id": merchant.id,
            "amount": purchase.amount,
            "total_spent": mandate.total_spent,
            "status": mandate.status,
        }),
    )
    .await?;

    let data = PurchaseData::new(purchase, &mandate);
    idempotency::complete(
        &mut *tx,
        SCOPE,
        &key,
        &serde_json::to_value(&data).context("serialize purchase")?,
    )
    .await?;
    tx.commit().await?;

    info!(
        purchase_id = %data.id,
        mandate_id = %data.mandate_id,
        remaining = %data.mandate_remaining,
        "Purchase recorded"
    );
    Ok(data)
}
