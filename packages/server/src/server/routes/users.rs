use axum::{extract::State, http::StatusCode, Json};

use crate::common::{AppResult, Scope};
use crate::domains::api_keys::actions::issue_api_key;
use crate::domains::api_keys::{IssueApiKeyRequest, IssuedApiKeyData};
use crate::domains::users::actions::create_user;
use crate::domains::users::{CreateUserRequest, UserData};
use crate::kernel::ServerDeps;
use crate::server::extractors::{ApiJson, AuthContext};

pub async fn create_user_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserData>)> {
    let principal = auth.require(Scope::Admin)?;
    let user = create_user(request, principal, &deps).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn issue_api_key_handler(
    State(deps): State<ServerDeps>,
    auth: AuthContext,
    ApiJson(request): ApiJson<IssueApiKeyRequest>,
) -> AppResult<(StatusCode, Json<IssuedApiKeyData>)> {
    let principal = auth.require(Scope::Admin)?;
    let issued = issue_api_key(request, &principal.actor(), &deps).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}
