use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};

use crate::common::AppResult;
use crate::domains::webhooks::actions::ingest_webhook;
use crate::domains::webhooks::{WebhookAck, WebhookDelivery};
use crate::kernel::ServerDeps;

pub const SIGNATURE_HEADER: &str = "x-psp-signature";
pub const TIMESTAMP_HEADER: &str = "x-psp-timestamp";
pub const EVENT_ID_HEADER: &str = "x-psp-event-id";
pub const PSP_REF_HEADER: &str = "x-psp-ref";
pub const PROVIDER_HEADER: &str = "x-psp-provider";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// The body is taken raw: the signature covers the exact bytes received.
pub async fn psp_webhook_handler(
    State(deps): State<ServerDeps>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let delivery = WebhookDelivery {
        body: body.to_vec(),
        signature: header(&headers, SIGNATURE_HEADER),
        timestamp: header(&headers, TIMESTAMP_HEADER),
        event_id: header(&headers, EVENT_ID_HEADER),
        psp_ref: header(&headers, PSP_REF_HEADER),
        provider: header(&headers, PROVIDER_HEADER),
    };
    Ok(Json(ingest_webhook(delivery, &deps).await?))
}
