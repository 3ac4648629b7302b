use lazy_static::lazy_static;
use regex::Regex;

/// Type of PII that was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiType {
    Email,
    Phone,
    Iban,
    CreditCard,
}

/// A detected piece of PII with its location
#[derive(Debug, Clone)]
pub struct PiiMatch {
    pub pii_type: PiiType,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

/// Non-overlapping PII matches found in one piece of text
#[derive(Debug, Default, Clone)]
pub struct PiiFindings {
    pub matches: Vec<PiiMatch>,
}

impl PiiFindings {
    pub fn new() -> Self {
        Self {
            matches: Vec::new(),
        }
    }

    /// Adds a match unless it overlaps one already found.
    pub fn add(&mut self, pii_type: PiiType, value: String, start: usize, end: usize) {
        if self
            .matches
            .iter()
            .any(|m| start < m.end && m.start < end)
        {
            return;
        }
        self.matches.push(PiiMatch {
            pii_type,
            value,
            start,
            end,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn count(&self) -> usize {
        self.matches.len()
    }

    pub fn by_type(&self, pii_type: PiiType) -> Vec<&PiiMatch> {
        self.matches
            .iter()
            .filter(|m| m.pii_type == pii_type)
            .collect()
    }
}

lazy_static! {
    // Email pattern - RFC 5322 simplified
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b"
    ).unwrap();

    // IBAN - country code, check digits, 11..30 alphanumerics, optional spaces every 4
    static ref IBAN_REGEX: Regex = Regex::new(
        r"\b[A-Z]{2}\d{2}(?:\s?[A-Z0-9]{4}){2,7}(?:\s?[A-Z0-9]{1,4})?\b"
    ).unwrap();

    // Credit card numbers - 16 digits in groups of four, or Amex 4-6-5
    static ref CREDIT_CARD_REGEX: Regex = Regex::new(
        r"\b(?:\d{4}[-\s]?){3}\d{4}\b|\b\d{4}[-\s]?\d{6}[-\s]?\d{5}\b"
    ).unwrap();

    // Phone numbers - optional country code, 10 digits in common groupings
    static ref PHONE_REGEX: Regex = Regex::new(
        r"(?:\+\d{1,3}[-.\s]?)?\(?\b\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b"
    ).unwrap();
}

/// Detect structured PII in free text.
///
/// Patterns are applied from most to least specific so an IBAN is never
/// reported as a phone number.
pub fn detect_structured_pii(text: &str) -> PiiFindings {
    let mut findings = PiiFindings::new();

    let patterns: [(&Regex, PiiType); 4] = [
        (&IBAN_REGEX, PiiType::Iban),
        (&CREDIT_CARD_REGEX, PiiType::CreditCard),
        (&EMAIL_REGEX, PiiType::Email),
        (&PHONE_REGEX, PiiType::Phone),
    ];

    for (regex, pii_type) in patterns {
        for mat in regex.find_iter(text) {
            findings.add(pii_type, mat.as_str().to_string(), mat.start(), mat.end());
        }
    }

    findings
}

/// Quick check used before doing any redaction work.
pub fn contains_pii(text: &str) -> bool {
    !detect_structured_pii(text).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_email() {
        let findings = detect_structured_pii("Reach the provider at ana.lopez@example.org today");
        let emails = findings.by_type(PiiType::Email);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].value, "ana.lopez@example.org");
    }

    #[test]
    fn test_detect_iban_not_phone() {
        let findings = detect_structured_pii("Pay to DE89 3704 0044 0532 0130 00 please");
        assert_eq!(findings.by_type(PiiType::Iban).len(), 1);
        assert!(findings.by_type(PiiType::Phone).is_empty());
    }

    #[test]
    fn test_detect_phone() {
        let findings = detect_structured_pii("call (555) 123-4567");
        assert_eq!(findings.by_type(PiiType::Phone).len(), 1);
    }

    #[test]
    fn test_clean_text() {
        assert!(!contains_pii("Delivered 40 bags of cement to the site"));
    }
}
