//! Invoice field normalisation for document proofs.

use serde_json::{Map, Value as JsonValue};

use crate::common::{AppError, AppResult, Money};
use crate::domains::proofs::models::ProofKind;

pub const FLAG_INVOICE_TOTAL_MISSING: &str = "INVOICE_TOTAL_MISSING";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFields {
    pub total: Option<Money>,
    /// Uppercase ISO 4217 code
    pub currency: Option<String>,
    pub flags: Vec<String>,
}

/// Pull `invoice_total` (or `amount`) and `currency` out of document metadata.
///
/// A total that is present but unreadable is an error; an INVOICE without a
/// total only raises a review flag.
pub fn normalize_invoice(
    kind: ProofKind,
    metadata: &Map<String, JsonValue>,
) -> AppResult<InvoiceFields> {
    let mut fields = InvoiceFields::default();

    let raw_total = metadata
        .get("invoice_total")
        .or_else(|| metadata.get("amount"))
        .filter(|v| !v.is_null());
    match raw_total {
        Some(value) => fields.total = Some(parse_total(value)?),
        None if kind == ProofKind::Invoice => {
            fields.flags.push(FLAG_INVOICE_TOTAL_MISSING.to_string())
        }
        None => {}
    }

    let raw_currency = metadata
        .get("invoice_currency")
        .or_else(|| metadata.get("currency"))
        .filter(|v| !v.is_null());
    if let Some(value) = raw_currency {
        fields.currency = Some(parse_currency(value)?);
    }

    Ok(fields)
}

fn parse_total(value: &JsonValue) -> AppResult<Money> {
    let parsed = match value {
        JsonValue::String(s) => s.trim().replace(',', "").parse::<Money>().ok(),
        JsonValue::Number(_) => serde_json::from_value::<Money>(value.clone()).ok(),
        _ => None,
    };
    match parsed {
        Some(total) if !total.is_negative() => Ok(total),
        _ => Err(normalization_error(format!("invoice total {} is not a valid amount", value))),
    }
}

fn parse_currency(value: &JsonValue) -> AppResult<String> {
    let code = value
        .as_str()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic()));
    code.ok_or_else(|| normalization_error(format!("invoice currency {} is not an ISO code", value)))
}

fn normalization_error(message: String) -> AppError {
    AppError::validation("INVOICE_NORMALIZATION_ERROR", message)
}
