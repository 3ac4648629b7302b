use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::common::{AppError, AppResult};

pub const DEFAULT_PROVIDER: &str = "psp";

/// One raw webhook delivery as received over HTTP.
#[derive(Debug, Clone, Default)]
pub struct WebhookDelivery {
    pub body: Vec<u8>,
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub event_id: Option<String>,
    pub psp_ref: Option<String>,
    pub provider: Option<String>,
}

impl WebhookDelivery {
    pub fn provider(&self) -> String {
        self.provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
    }
}

/// What a webhook asks us to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    PaymentSettled,
    PaymentFailed,
    FundingSucceeded,
    FundingFailed,
    /// Stored and acknowledged only
    Ignored,
}

impl WebhookAction {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "payment.settled" | "payment_succeeded" => Self::PaymentSettled,
            "payment.failed" | "payment_failed" => Self::PaymentFailed,
            "funding.succeeded" | "funding_intent.succeeded" | "payment_intent.succeeded" => {
                Self::FundingSucceeded
            }
            "funding.failed" | "funding_intent.failed" | "payment_intent.payment_failed" => {
                Self::FundingFailed
            }
            _ => Self::Ignored,
        }
    }
}

/// Fields pulled out of the JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEnvelope {
    pub payload: JsonValue,
    pub kind: String,
    pub event_id: Option<String>,
    pub psp_ref: Option<String>,
    /// Our payout idempotency key, echoed back by the PSP. Identifies a
    /// payment that never received a PSP reference.
    pub payment_key: Option<String>,
    pub reason: Option<String>,
}

fn text(value: Option<&JsonValue>) -> Option<String> {
    value
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl WebhookEnvelope {
    /// Parse the body. The kind comes from `type`, `event_type` or `kind`;
    /// the PSP reference from `psp_ref` or `data.object.id`; the payment key
    /// from `payment_key` or `data.object.metadata.payment_key`.
    pub fn parse(body: &[u8]) -> AppResult<Self> {
        let payload: JsonValue = serde_json::from_slice(body)
            .map_err(|e| AppError::bad_request("INVALID_PAYLOAD", format!("webhook body is not JSON: {}", e)))?;
        if !payload.is_object() {
            return Err(AppError::bad_request(
                "INVALID_PAYLOAD",
                "webhook body must be a JSON object",
            ));
        }

        let kind = text(payload.get("type"))
            .or_else(|| text(payload.get("event_type")))
            .or_else(|| text(payload.get("kind")))
            .unwrap_or_else(|| "unknown".to_string());
        let event_id = text(payload.get("id")).or_else(|| text(payload.get("event_id")));
        let object = payload.get("data").and_then(|d| d.get("object"));
        let psp_ref = text(payload.get("psp_ref"))
            .or_else(|| text(object.and_then(|o| o.get("id"))));
        let payment_key = text(payload.get("payment_key")).or_else(|| {
            text(
                object
                    .and_then(|o| o.get("metadata"))
                    .and_then(|m| m.get("payment_key")),
            )
        });
        let reason = text(payload.get("reason"))
            .or_else(|| text(object.and_then(|o| o.get("failure_message"))));

        Ok(Self {
            payload,
            kind,
            event_id,
            psp_ref,
            payment_key,
            reason,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub provider: String,
    pub event_id: String,
    pub kind: String,
}
