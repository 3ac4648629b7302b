use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::common::{AppResult, Scope};
use crate::domains::mandates::actions::{
    add_allowlist_entry, create_mandate, create_merchant, expire_mandates, purchase,
};
use crate::domains::mandates::{
    AllowlistEntryData, AllowlistRequest, CreateMandateRequest, CreateMerchantRequest,
    MandateData, MerchantData, PurchaseData, PurchaseRequest,
};
use crate::domains::transactions::actions::create_transaction;
use crate::domains::transactions::{CreateTransactionRequest, TransactionData};
use crate::kernel::ServerDeps;
use crate::server::extractors::{ApiJson, AuthContext, IdempotencyKey};

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub expired: usize,
}

pub async fn create_mandate_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateMandateRequest>,
) -> AppResult<(StatusCode, Json<MandateData>)> {
    let principal = auth.require(Scope::Sender)?;
    let mandate = create_mandate(request, principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(mandate.into())))
}

pub async fn cleanup_mandates_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
) -> AppResult<(StatusCode, Json<CleanupResponse>)> {
    let principal = auth.require(Scope::Sender)?;
    let expired = expire_mandates(&principal.actor(), &deps).await?;
    Ok((StatusCode::ACCEPTED, Json(CleanupResponse { expired })))
}

pub async fn create_merchant_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateMerchantRequest>,
) -> AppResult<(StatusCode, Json<MerchantData>)> {
    let principal = auth.require(Scope::Admin)?;
    let merchant = create_merchant(request, principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(merchant.into())))
}

pub async fn allowlist_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    ApiJson(request): ApiJson<AllowlistRequest>,
) -> AppResult<(StatusCode, Json<AllowlistEntryData>)> {
    let principal = auth.require(Scope::Sender)?;
    let entry = add_allowlist_entry(request, principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

pub async fn purchase_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    key: IdempotencyKey,
    ApiJson(request): ApiJson<PurchaseRequest>,
) -> AppResult<(StatusCode, Json<PurchaseData>)> {
    let principal = auth.require(Scope::Sender)?;
    let data = purchase(request, key.as_deref(), principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(data)))
}

pub async fn create_transaction_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    key: IdempotencyKey,
    ApiJson(request): ApiJson<CreateTransactionRequest>,
) -> AppResult<(StatusCode, Json<TransactionData>)> {
    let principal = auth.require(Scope::Admin)?;
    let data = create_transaction(request, key.as_deref(), principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(data)))
}
