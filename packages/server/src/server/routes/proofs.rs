use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::common::{AppResult, PaymentId, ProofId, Scope};
use crate::domains::payments::actions::execute_payment;
use crate::domains::payments::PaymentData;
use crate::domains::proofs::actions::{decide_proof, submit_proof};
use crate::domains::proofs::{ProofDecisionRequest, ProofOutcome, SubmitProofRequest};
use crate::kernel::ServerDeps;
use crate::server::extractors::{ApiJson, AuthContext};

pub async fn submit_proof_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    ApiJson(request): ApiJson<SubmitProofRequest>,
) -> AppResult<(StatusCode, Json<ProofOutcome>)> {
    let principal = auth.require(Scope::Sender)?;
    let outcome = submit_proof(request, principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn decide_proof_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(proof_id): Path<ProofId>,
    ApiJson(request): ApiJson<ProofDecisionRequest>,
) -> AppResult<Json<ProofOutcome>> {
    let principal = auth.require(Scope::Support)?;
    Ok(Json(decide_proof(proof_id, request, principal, &deps).await?))
}

pub async fn execute_payment_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    Path(payment_id): Path<PaymentId>,
) -> AppResult<Json<PaymentData>> {
    let principal = auth.require(Scope::Admin)?;
    let payment = execute_payment(payment_id, principal, &deps).await?;
    Ok(Json(payment.into()))
}
