//! PSP webhook signature verification.
//!
//! The PSP signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends the hex
//! digest, optionally prefixed with `sha256=`. During secret rotation either
//! the primary or the next secret is accepted.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::common::{AppError, AppResult};
use crate::kernel::WebhookSecrets;

type HmacSha256 = Hmac<Sha256>;

/// Parse the UNIX-seconds timestamp header and check it is within `max_drift`
/// seconds of `now`, in either direction.
pub fn check_timestamp(raw: Option<&str>, now: DateTime<Utc>, max_drift: i64) -> AppResult<i64> {
    let out_of_range = || {
        AppError::unauthorized(
            "WEBHOOK_TIMESTAMP_OUT_OF_RANGE",
            "webhook timestamp is missing or outside the accepted window",
        )
    };
    let ts: i64 = raw
        .map(str::trim)
        .and_then(|s| s.parse().ok())
        .ok_or_else(out_of_range)?;
    if (now.timestamp() - ts).abs() > max_drift {
        return Err(out_of_range());
    }
    Ok(ts)
}

pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Verify the signature header against every configured secret.
pub fn verify(
    secrets: &WebhookSecrets,
    timestamp: &str,
    body: &[u8],
    signature: Option<&str>,
) -> AppResult<()> {
    if secrets.is_empty() {
        return Err(AppError::unavailable(
            "WEBHOOK_SECRET_MISSING",
            "no webhook secret is configured",
        ));
    }

    let invalid = || AppError::unauthorized("WEBHOOK_SIGNATURE_INVALID", "webhook signature mismatch");
    let raw = signature.map(str::trim).ok_or_else(invalid)?;
    let hex_sig = raw.strip_prefix("sha256=").unwrap_or(raw);
    let provided = hex::decode(hex_sig.to_ascii_lowercase()).map_err(|_| invalid())?;

    let matches = [secrets.primary.as_deref(), secrets.next.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(|secret| sign(secret, timestamp, body))
        .any(|expected| bool::from(expected.ct_eq(&provided)));

    if matches {
        Ok(())
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment.settled"}"#;

    fn secrets(primary: Option<&str>, next: Option<&str>) -> WebhookSecrets {
        WebhookSecrets {
            primary: primary.map(str::to_string),
            next: next.map(str::to_string),
        }
    }

    fn header(secret: &str, ts: &str) -> String {
        hex::encode(sign(secret, ts, BODY).unwrap())
    }

    #[test]
    fn test_accepts_primary_with_and_without_prefix() {
        let s = secrets(Some("whsec_a"), None);
        let sig = header("whsec_a", "1777636800");
        assert!(verify(&s, "1777636800", BODY, Some(&sig)).is_ok());
        assert!(verify(&s, "1777636800", BODY, Some(&format!("sha256={}", sig))).is_ok());
    }

    #[test]
    fn test_accepts_rotation_secret() {
        let s = secrets(Some("whsec_a"), Some("whsec_b"));
        let sig = header("whsec_b", "1777636800");
        assert!(verify(&s, "1777636800", BODY, Some(&sig)).is_ok());
    }

    #[test]
    fn test_rejects_tampered_body_and_wrong_secret() {
        let s = secrets(Some("whsec_a"), None);
        let sig = header("whsec_a", "1777636800");
        let err = verify(&s, "1777636800", b"{}", Some(&sig)).unwrap_err();
        assert!(err.is_code("WEBHOOK_SIGNATURE_INVALID"));

        let other = header("whsec_z", "1777636800");
        assert!(verify(&s, "1777636800", BODY, Some(&other)).is_err());
        assert!(verify(&s, "1777636800", BODY, Some("not-hex")).is_err());
        assert!(verify(&s, "1777636800", BODY, None).is_err());
    }

    #[test]
    fn test_missing_secret_is_unavailable() {
        let err = verify(&secrets(None, None), "1", BODY, Some("00")).unwrap_err();
        assert!(err.is_code("WEBHOOK_SECRET_MISSING"));
    }

    #[test]
    fn test_timestamp_drift() {
        let now = Utc.timestamp_opt(1_777_636_800, 0).unwrap();
        assert!(check_timestamp(Some("1777636800"), now, 300).is_ok());
        assert!(check_timestamp(Some("1777636500"), now, 300).is_ok());
        assert!(check_timestamp(Some("1777636499"), now, 300).is_err());
        assert!(check_timestamp(Some("1777637101"), now, 300).is_err());
        assert!(check_timestamp(Some("yesterday"), now, 300).is_err());
        assert!(check_timestamp(None, now, 300).is_err());
    }
}
