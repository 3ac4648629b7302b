use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::domains::api_keys::actions::authenticate;
use crate::kernel::ServerDeps;
use crate::server::extractors::AuthContext;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Credential from `Authorization: Bearer <token>` or `X-API-Key`.
fn presented_credential(request: &Request) -> Option<String> {
    let headers = request.headers();
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));
    bearer
        .or_else(|| headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve the API key into an [`AuthContext`] extension.
///
/// Requests without a credential pass through unauthenticated; each handler
/// decides the scope it needs. A credential that does not check out is
/// answered here.
pub async fn api_key_auth_middleware(
    State(deps): State<ServerDeps>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = match presented_credential(&request) {
        None => None,
        Some(credential) => match authenticate(&credential, &deps).await {
            Ok(principal) => Some(principal),
            Err(e) => return e.into_response(),
        },
    };

    request.extensions_mut().insert(AuthContext(principal));
    next.run(request).await
}
