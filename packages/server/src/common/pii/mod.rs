/// PII (Personally Identifiable Information) detection and redaction
///
/// Used by the audit sink before anything is persisted and by the proof
/// advisor before metadata leaves the process.
///
/// # Redaction Strategies
///
/// - `FullRemoval`: Replace PII with [REDACTED] token
/// - `PartialMask`: Keep the least identifying part (ana@example.org → ***@example.org)
/// - `TokenReplacement`: Replace with typed tokens ([EMAIL], [PHONE], [IBAN])
///
/// # Examples
///
/// ```rust
/// use escrow_core::common::pii::{detect_structured_pii, redact_pii, RedactionStrategy};
///
/// let text = "Refund to DE89370400440532013000 or mail ana@example.org";
/// let findings = detect_structured_pii(text);
/// let clean = redact_pii(text, &findings, RedactionStrategy::TokenReplacement);
/// assert_eq!(clean, "Refund to [IBAN] or mail [EMAIL]");
/// ```

pub mod detector;
pub mod redactor;

pub use detector::{contains_pii, detect_structured_pii, PiiFindings, PiiMatch, PiiType};
pub use redactor::{
    mask_account, mask_email, mask_phone, mask_storage_url, redact_pii, truncate_chars,
    RedactionStrategy,
};
