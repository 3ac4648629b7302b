use super::detector::{PiiFindings, PiiMatch, PiiType};

/// Strategy for redacting PII
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionStrategy {
    /// Completely remove PII, replace with [REDACTED] token
    FullRemoval,
    /// Keep the least identifying part.
    /// Example: ana@example.org -> ***@example.org
    PartialMask,
    /// Replace with typed tokens
    /// Example: ana@example.org -> [EMAIL]
    TokenReplacement,
}

/// Redact PII from text based on findings and strategy
pub fn redact_pii(text: &str, findings: &PiiFindings, strategy: RedactionStrategy) -> String {
    if findings.is_empty() {
        return text.to_string();
    }

    // Replace back to front so earlier offsets stay valid
    let mut sorted_matches: Vec<&PiiMatch> = findings.matches.iter().collect();
    sorted_matches.sort_by(|a, b| b.start.cmp(&a.start));

    let mut result = text.to_string();

    for pii_match in sorted_matches {
        let replacement = match strategy {
            RedactionStrategy::FullRemoval => "[REDACTED]".to_string(),
            RedactionStrategy::PartialMask => mask_value(&pii_match.value, pii_match.pii_type),
            RedactionStrategy::TokenReplacement => {
                format!("[{}]", type_to_token(pii_match.pii_type))
            }
        };

        result.replace_range(pii_match.start..pii_match.end, &replacement);
    }

    result
}

fn type_to_token(pii_type: PiiType) -> &'static str {
    match pii_type {
        PiiType::Email => "EMAIL",
        PiiType::Phone => "PHONE",
        PiiType::Iban => "IBAN",
        PiiType::CreditCard => "CREDIT_CARD",
    }
}

fn mask_value(value: &str, pii_type: PiiType) -> String {
    match pii_type {
        PiiType::Email => mask_email(value),
        PiiType::Phone => mask_phone(value),
        PiiType::Iban | PiiType::CreditCard => mask_account(value),
    }
}

/// ana.lopez@example.org -> ***@example.org
pub fn mask_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((_, domain)) if !domain.is_empty() => format!("***@{}", domain),
        _ => "***".to_string(),
    }
}

/// Keep the last four alphanumerics: DE89 3704 0044 0532 0130 00 -> ****3000
pub fn mask_account(account: &str) -> String {
    let compact: Vec<char> = account.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if compact.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = compact[compact.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Keep the last two digits: +1 555 123 4567 -> ********67
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 2 {
        return "**".to_string();
    }
    let tail: String = digits[digits.len() - 2..].iter().collect();
    format!("{}{}", "*".repeat(digits.len() - 2), tail)
}

/// Keep scheme, host and directory; drop the file name and query string.
///
/// `https://files.example.org/proofs/42/photo.jpg?sig=abc` becomes
/// `https://files.example.org/proofs/42/`.
pub fn mask_storage_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path_start = without_query
        .find("://")
        .map(|scheme_end| scheme_end + 3)
        .unwrap_or(0);
    match without_query[path_start..].rfind('/') {
        Some(slash) => without_query[..path_start + slash + 1].to_string(),
        None => without_query.to_string(),
    }
}

/// Truncate to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::pii::detect_structured_pii;

    #[test]
    fn test_masks() {
        assert_eq!(mask_email("ana.lopez@example.org"), "***@example.org");
        assert_eq!(mask_account("DE89 3704 0044 0532 0130 00"), "****3000");
        assert_eq!(mask_phone("+1 555 123 4567"), "*********67");
        assert_eq!(mask_phone("7"), "**");
    }

    #[test]
    fn test_storage_url_keeps_directory() {
        assert_eq!(
            mask_storage_url("https://files.example.org/proofs/42/photo.jpg?sig=abc"),
            "https://files.example.org/proofs/42/"
        );
        assert_eq!(
            mask_storage_url("https://files.example.org"),
            "https://files.example.org"
        );
    }

    #[test]
    fn test_token_replacement() {
        let text = "iban DE89370400440532013000, mail ana@example.org";
        let findings = detect_structured_pii(text);
        let redacted = redact_pii(text, &findings, RedactionStrategy::TokenReplacement);
        assert_eq!(redacted, "iban [IBAN], mail [EMAIL]");
    }

    #[test]
    fn test_partial_mask_in_text() {
        let text = "contact ana@example.org";
        let findings = detect_structured_pii(text);
        let redacted = redact_pii(text, &findings, RedactionStrategy::PartialMask);
        assert_eq!(redacted, "contact ***@example.org");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
