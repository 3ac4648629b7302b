use serde_json::json;
use tracing::info;

use crate::common::{AppError, AppResult, Principal};
use crate::domains::audit;
use crate::domains::mandates::data::{AllowlistRequest, CreateMerchantRequest};
use crate::domains::mandates::models::{AllowlistEntry, Merchant};
use crate::domains::users::User;
use crate::kernel::ServerDeps;

pub async fn create_merchant(
    request: CreateMerchantRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<Merchant> {
    request.validate()?;

    let mut tx = deps.db_pool.begin().await?;
    let merchant = Merchant::create(
        request.name.trim(),
        &request.category.trim().to_ascii_lowercase(),
        request.is_certified,
        &mut *tx,
    )
    .await?;
    audit::record(
        &mut *tx,
        &principal.actor(),
        "MERCHANT_CREATED",
        "merchant",
        merchant.id,
        json!({
            "name": merchant.name,
            "category": merchant.category,
            "is_certified": merchant.is_certified,
        }),
    )
    .await?;
    tx.commit().await?;

    info!(merchant_id = %merchant.id, category = %merchant.category, "Merchant registered");
    Ok(merchant)
}

/// Let a beneficiary buy from a merchant or a whole category.
pub async fn add_allowlist_entry(
    request: AllowlistRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<AllowlistEntry> {
    request.validate()?;
    let category = request.category().map(|c| c.to_ascii_lowercase());

    let mut tx = deps.db_pool.begin().await?;

    if !User::exists(request.beneficiary_id, &mut *tx).await? {
        return Err(AppError::not_found(
            "USER_NOT_FOUND",
            format!("user {} not found", request.beneficiary_id),
        ));
    }
    if let Some(merchant_id) = request.merchant_id {
        if Merchant::find_by_id(merchant_id, &mut *tx).await?.is_none() {
            return Err(AppError::not_found(
                "MERCHANT_NOT_FOUND",
                format!("merchant {} not found", merchant_id),
            ));
        }
    }

    let entry = AllowlistEntry::create(
        request.beneficiary_id,
        request.merchant_id,
        category.as_deref(),
        &mut *tx,
    )
    .await?;
    audit::record(
        &mut *tx,
        &principal.actor(),
        "ALLOWLIST_ENTRY_CREATED",
        "beneficiary_allowlist",
        entry.id,
        json!({
            "beneficiary_id": entry.beneficiary_id,
            "merchant_id": entry.merchant_id,
            "category": entry.category,
        }),
    )
    .await?;
    tx.commit().await?;

    info!(entry_id = %entry.id, beneficiary_id = %entry.beneficiary_id, "Allowlist entry added");
    Ok(entry)
}
