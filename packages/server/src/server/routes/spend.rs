use axum::{extract::State, http::StatusCode, Json};

use crate::common::{AppResult, Scope};
use crate::domains::spend::actions::{register_payee, spend};
use crate::domains::spend::{AllowedPayeeData, RegisterPayeeRequest, SpendData, SpendRequest};
use crate::kernel::ServerDeps;
use crate::server::extractors::{ApiJson, AuthContext, IdempotencyKey};

pub async fn register_payee_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    key: IdempotencyKey,
    ApiJson(request): ApiJson<RegisterPayeeRequest>,
) -> AppResult<(StatusCode, Json<AllowedPayeeData>)> {
    let principal = auth.require(Scope::Sender)?;
    let payee = register_payee(request, key.as_deref(), principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(payee)))
}

pub async fn spend_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    key: IdempotencyKey,
    ApiJson(request): ApiJson<SpendRequest>,
) -> AppResult<Json<SpendData>> {
    let principal = auth.require(Scope::Sender)?;
    Ok(Json(spend(request, key.as_deref(), principal, &deps).await?))
}
