use serde_json::{Map, Value as JsonValue};

use crate::common::pii::{
    detect_structured_pii, mask_account, mask_email, mask_phone, mask_storage_url, redact_pii,
    truncate_chars, RedactionStrategy,
};

/// Free-text keys that are kept (redacted and truncated) rather than dropped.
const FREE_TEXT_KEYS: &[&str] = &["note", "reason", "explanation", "description", "message"];

const FREE_TEXT_MAX_CHARS: usize = 500;

/// Strings longer than this under any other key are replaced by a length marker.
const BULK_TEXT_THRESHOLD: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyClass {
    Account,
    Email,
    Phone,
    StorageUrl,
    FreeText,
    Other,
}

fn classify(key: &str) -> KeyClass {
    let key = key.to_ascii_lowercase();
    if key.contains("iban") || key.contains("account") || key.contains("bank") {
        KeyClass::Account
    } else if key.contains("email") {
        KeyClass::Email
    } else if key.contains("phone") || key.contains("mobile") || key.contains("msisdn") {
        KeyClass::Phone
    } else if key.contains("url") || key.contains("uri") {
        KeyClass::StorageUrl
    } else if FREE_TEXT_KEYS.contains(&key.as_str()) {
        KeyClass::FreeText
    } else {
        KeyClass::Other
    }
}

/// Returns a copy of `data` with sensitive values masked.
pub fn sanitize_payload(data: &JsonValue) -> JsonValue {
    match data {
        JsonValue::Object(map) => {
            let mut clean = Map::new();
            for (key, value) in map {
                clean.insert(key.clone(), sanitize_value(classify(key), value));
            }
            JsonValue::Object(clean)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(sanitize_payload).collect()),
        JsonValue::String(s) => JsonValue::String(sanitize_other_text(s)),
        other => other.clone(),
    }
}

fn sanitize_value(class: KeyClass, value: &JsonValue) -> JsonValue {
    let text = match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) if class != KeyClass::Other && class != KeyClass::FreeText => {
            n.to_string()
        }
        // Containers and scalars under a neutral key are walked as usual
        _ => return sanitize_payload(value),
    };

    let masked = match class {
        KeyClass::Account => mask_account(&text),
        KeyClass::Email => mask_email(&text),
        KeyClass::Phone => mask_phone(&text),
        KeyClass::StorageUrl => mask_storage_url(&text),
        KeyClass::FreeText => {
            let findings = detect_structured_pii(&text);
            let redacted = redact_pii(&text, &findings, RedactionStrategy::TokenReplacement);
            truncate_chars(&redacted, FREE_TEXT_MAX_CHARS)
        }
        KeyClass::Other => sanitize_other_text(&text),
    };
    JsonValue::String(masked)
}

fn sanitize_other_text(text: &str) -> String {
    let len = text.chars().count();
    if len > BULK_TEXT_THRESHOLD {
        format!("[TEXT:{} chars]", len)
    } else {
        let findings = detect_structured_pii(text);
        redact_pii(text, &findings, RedactionStrategy::PartialMask)
    }
}
