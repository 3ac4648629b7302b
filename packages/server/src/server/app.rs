//! Application setup and server configuration.

use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::{api_key_auth_middleware, API_KEY_HEADER};
use crate::server::routes::*;

/// Upper bound for a single request, PSP and advisor calls included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the Axum application router
///
/// Authenticated API routes sit behind the API-key middleware; the webhook
/// and health endpoints do not.
pub fn build_app(deps: ServerDeps) -> Router {
    let api = Router::new()
        .route("/users", post(create_user_handler))
        .route("/api-keys", post(issue_api_key_handler))
        // Escrow ledger
        .route("/escrows", post(create_escrow_handler))
        .route("/escrows/:id", get(get_escrow_handler))
        .route("/escrows/:id/deposit", post(deposit_handler))
        .route("/escrows/:id/mark-delivered", post(mark_delivered_handler))
        .route("/escrows/:id/client-approve", post(client_approve_handler))
        .route("/escrows/:id/client-reject", post(client_reject_handler))
        .route("/escrows/:id/check-deadline", post(check_deadline_handler))
        .route("/escrows/:id/cancel", post(cancel_handler))
        .route("/escrows/:id/refund", post(refund_handler))
        .route("/escrows/:id/funding-intent", post(funding_intent_handler))
        .route("/escrows/:id/milestones", post(create_milestone_handler))
        // Proofs and payouts
        .route("/proofs", post(submit_proof_handler))
        .route("/proofs/:id/decision", post(decide_proof_handler))
        .route("/payments/execute/:id", post(execute_payment_handler))
        .route("/transactions", post(create_transaction_handler))
        // Mandates and usage spend
        .route("/mandates", post(create_mandate_handler))
        .route("/mandates/cleanup", post(cleanup_mandates_handler))
        .route("/spend/merchants", post(create_merchant_handler))
        .route("/spend/allowlist", post(allowlist_handler))
        .route("/spend/purchases", post(purchase_handler))
        .route("/spend/allowed", post(register_payee_handler))
        .route("/spend", post(spend_handler))
        .layer(middleware::from_fn_with_state(
            deps.clone(),
            api_key_auth_middleware,
        ));

    let public = Router::new()
        .route("/psp/webhook", post(psp_webhook_handler))
        .route("/health", get(health_handler));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static("idempotency-key"),
        ]);

    api.merge(public)
        .with_state(deps)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
