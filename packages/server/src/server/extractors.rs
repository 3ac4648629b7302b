//! Request extractors shared by the route handlers.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use std::convert::Infallible;

use crate::common::{AppError, AppResult, Principal, Scope};
use crate::server::error::invalid_payload;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Raw `Idempotency-Key` header. Use cases decide whether it is required.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyKey(pub Option<String>);

impl IdempotencyKey {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for IdempotencyKey {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(IdempotencyKey(key))
    }
}

/// Authentication result stored in request extensions by
/// [`api_key_auth_middleware`](crate::server::middleware::api_key_auth_middleware).
///
/// The middleware never blocks; handlers guard with [`AuthContext::require`].
#[derive(Debug, Clone, Default)]
pub struct AuthContext(pub Option<Principal>);

impl AuthContext {
    /// The caller, if it holds `scope`.
    pub fn require(&self, scope: Scope) -> AppResult<&Principal> {
        let principal = self
            .0
            .as_ref()
            .ok_or_else(|| AppError::unauthorized("NO_API_KEY", "an API key is required"))?;
        principal.require(scope)?;
        Ok(principal)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<AuthContext>().cloned().unwrap_or_default())
    }
}

/// `Json` that rejects with the error envelope instead of axum's plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(invalid_payload)?;
        Ok(ApiJson(value))
    }
}

/// Optional JSON body: an empty body yields `T::default()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::bad_request("INVALID_PAYLOAD", e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::bad_request("INVALID_PAYLOAD", e.to_string()))?;
        Ok(OptionalJson(value))
    }
}
