use serde_json::json;
use tracing::info;

use crate::common::{AppError, AppResult, Principal};
use crate::domains::audit;
use crate::domains::mandates::data::CreateMandateRequest;
use crate::domains::mandates::models::{Merchant, UsageMandate};
use crate::domains::users::User;
use crate::kernel::ServerDeps;

/// Open a mandate. A triple may have only one ACTIVE mandate; one that has
/// already run past its deadline is expired first.
pub async fn create_mandate(
    request: CreateMandateRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<UsageMandate> {
    let now = deps.clock.now();
    let currency = request.validate(now)?;
    let actor = principal.actor();

    let mut tx = deps.db_pool.begin().await?;

    for user_id in [request.sender_id, request.beneficiary_id] {
        if !User::exists(user_id, &mut *tx).await? {
            return Err(AppError::not_found(
                "USER_NOT_FOUND",
                format!("user {} not found", user_id),
            ));
        }
    }
    if let Some(merchant_id) = request.allowed_merchant_id {
        if Merchant::find_by_id(merchant_id, &mut *tx).await?.is_none() {
            return Err(AppError::not_found(
                "MERCHANT_NOT_FOUND",
                format!("merchant {} not found", merchant_id),
            ));
        }
    }

    let stale = UsageMandate::expire_stale_for_triple(
        request.sender_id,
        request.beneficiary_id,
        currency,
        now,
        &mut *tx,
    )
    .await?;
    for mandate in &stale {
        audit::record(
            &mut *tx,
            &actor,
            "MANDATE_EXPIRED",
            "mandate",
            mandate.id,
            json!({ "expires_at": mandate.expires_at, "total_spent": mandate.total_spent }),
        )
        .await?;
    }

    let category = request.allowed_category();
    let mandate = UsageMandate::create(
        request.sender_id,
        request.beneficiary_id,
        request.total_amount,
        currency,
        category.as_deref(),
        request.allowed_merchant_id,
        request.expires_at,
        &mut *tx,
    )
    .await?
    .ok_or_else(|| {
        AppError::conflict(
            "MANDATE_ALREADY_ACTIVE",
            "an active mandate already exists for this sender, beneficiary and currency",
        )
    })?;

    audit::record(
        &mut *tx,
        &actor,
        "MANDATE_CREATED",
        "mandate",
        mandate.id,
        json!({
            "sender_id": mandate.sender_id,
            "beneficiary_id": mandate.beneficiary_id,
            "total_amount": mandate.total_amount,
            "currency": mandate.currency,
            "allowed_category": mandate.allowed_category,
            "allowed_merchant_id": mandate.allowed_merchant_id,
            "expires_at": mandate.expires_at,
        }),
    )
    .await?;

    tx.commit().await?;

    info!(mandate_id = %mandate.id, total = %mandate.total_amount, "Mandate created");
    Ok(mandate)
}
