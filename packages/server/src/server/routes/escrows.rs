use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::common::{AppResult, EscrowId, Scope};
use crate::domains::escrow::actions::{
    cancel, check_deadline, client_approve, client_reject, create_escrow, create_funding_intent,
    deposit, mark_delivered, refund, view,
};
use crate::domains::escrow::data::{
    CreateEscrowRequest, DeliveryRequest, DepositData, DepositRequest, EscrowData, EscrowView,
    FundingIntentData, FundingIntentRequest,
};
use crate::domains::milestones::actions::create_milestone;
use crate::domains::milestones::{CreateMilestoneRequest, MilestoneData};
use crate::kernel::ServerDeps;
use crate::server::extractors::{ApiJson, AuthContext, IdempotencyKey, OptionalJson};

pub async fn create_escrow_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateEscrowRequest>,
) -> AppResult<(StatusCode, Json<EscrowData>)> {
    let principal = auth.require(Scope::Sender)?;
    let escrow = create_escrow(request, principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(escrow.into())))
}

pub async fn get_escrow_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(escrow_id): Path<EscrowId>,
) -> AppResult<Json<EscrowView>> {
    auth.require(Scope::Sender)?;
    Ok(Json(view(escrow_id, &deps).await?))
}

pub async fn deposit_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    key: IdempotencyKey,
    Path(escrow_id): Path<EscrowId>,
    ApiJson(request): ApiJson<DepositRequest>,
) -> AppResult<Json<DepositData>> {
    let principal = auth.require(Scope::Sender)?;
    let outcome = deposit(escrow_id, request.amount, key.as_deref(), principal, &deps).await?;
    Ok(Json(DepositData::new(
        outcome.escrow,
        outcome.deposit,
        outcome.replayed,
    )))
}

pub async fn mark_delivered_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(escrow_id): Path<EscrowId>,
    OptionalJson(request): OptionalJson<DeliveryRequest>,
) -> AppResult<Json<EscrowData>> {
    let principal = auth.require(Scope::Sender)?;
    let escrow = mark_delivered(escrow_id, request, principal, &deps).await?;
    Ok(Json(escrow.into()))
}

pub async fn client_approve_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(escrow_id): Path<EscrowId>,
    OptionalJson(request): OptionalJson<DeliveryRequest>,
) -> AppResult<Json<EscrowData>> {
    let principal = auth.require(Scope::Sender)?;
    let escrow = client_approve(escrow_id, request, principal, &deps).await?;
    Ok(Json(escrow.into()))
}

pub async fn client_reject_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(escrow_id): Path<EscrowId>,
    OptionalJson(request): OptionalJson<DeliveryRequest>,
) -> AppResult<Json<EscrowData>> {
    let principal = auth.require(Scope::Sender)?;
    let escrow = client_reject(escrow_id, request, principal, &deps).await?;
    Ok(Json(escrow.into()))
}

pub async fn check_deadline_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(escrow_id): Path<EscrowId>,
) -> AppResult<Json<EscrowData>> {
    let principal = auth.require(Scope::Sender)?;
    let escrow = check_deadline(escrow_id, &principal.actor(), &deps).await?;
    Ok(Json(escrow.into()))
}

pub async fn cancel_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(escrow_id): Path<EscrowId>,
) -> AppResult<Json<EscrowData>> {
    let principal = auth.require(Scope::Admin)?;
    Ok(Json(cancel(escrow_id, principal, &deps).await?.into()))
}

pub async fn refund_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(escrow_id): Path<EscrowId>,
) -> AppResult<Json<EscrowData>> {
    let principal = auth.require(Scope::Admin)?;
    Ok(Json(refund(escrow_id, principal, &deps).await?.into()))
}

pub async fn funding_intent_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(escrow_id): Path<EscrowId>,
    ApiJson(request): ApiJson<FundingIntentRequest>,
) -> AppResult<(StatusCode, Json<FundingIntentData>)> {
    let principal = auth.require(Scope::Sender)?;
    let intent = create_funding_intent(escrow_id, request.amount, principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(intent.into())))
}

pub async fn create_milestone_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(escrow_id): Path<EscrowId>,
    ApiJson(request): ApiJson<CreateMilestoneRequest>,
) -> AppResult<(StatusCode, Json<MilestoneData>)> {
    let principal = auth.require(Scope::Sender)?;
    let milestone = create_milestone(escrow_id, request, principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(milestone.into())))
}
