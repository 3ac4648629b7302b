//! Context handed to the proof advisor.
//!
//! Only allowlisted metadata keys leave the process, and contact or account
//! details inside them are removed entirely.

use serde_json::{json, Map, Value as JsonValue};
use tracing::debug;

use crate::common::pii::{detect_structured_pii, redact_pii, PiiType, RedactionStrategy};
use crate::common::Money;
use crate::domains::proofs::models::ProofKind;

const ALLOWED_METADATA_KEYS: &[&str] = &[
    "source",
    "exif_timestamp",
    "gps_lat",
    "gps_lng",
    "software",
    "device",
    "invoice_total",
    "invoice_currency",
    "currency",
    "vendor",
    "description",
    "ocr_provider",
];

pub fn build_context(
    kind: ProofKind,
    milestone_label: &str,
    milestone_amount: Money,
    metadata: &Map<String, JsonValue>,
    rule_flags: &[String],
) -> JsonValue {
    let mut clean = Map::new();
    for key in ALLOWED_METADATA_KEYS {
        if let Some(value) = metadata.get(*key) {
            clean.insert((*key).to_string(), scrub(value));
        }
    }

    json!({
        "kind": kind,
        "milestone": {
            "label": scrub_str(milestone_label),
            "amount": milestone_amount,
        },
        "metadata": clean,
        "rule_flags": rule_flags,
    })
}

fn scrub(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) => JsonValue::String(scrub_str(s)),
        JsonValue::Number(_) | JsonValue::Bool(_) | JsonValue::Null => value.clone(),
        // Nested structures are not allowlisted
        _ => JsonValue::Null,
    }
}

fn scrub_str(text: &str) -> String {
    let findings = detect_structured_pii(text);
    if findings.is_empty() {
        return text.to_string();
    }
    debug!(
        matches = findings.count(),
        emails = findings.by_type(PiiType::Email).len(),
        ibans = findings.by_type(PiiType::Iban).len(),
        "Redacting PII from advisor context"
    );
    redact_pii(text, &findings, RedactionStrategy::FullRemoval)
}
