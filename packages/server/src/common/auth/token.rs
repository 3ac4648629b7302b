//! API token format and storage hashing.
//!
//! Tokens look like `ek_<prefix>_<secret>`. Only the prefix is stored in
//! clear; the full token is kept as `hex(HMAC-SHA256(salt [+ pepper], token))`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_PREFIX: &str = "ek";
const PREFIX_LEN: usize = 8;

/// A freshly generated token. `token` is shown to the caller once.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub prefix: String,
    pub salt: String,
    pub hash: String,
}

pub fn generate_token(pepper: Option<&str>) -> IssuedToken {
    let prefix: String = Uuid::new_v4().simple().to_string()[..PREFIX_LEN].to_string();
    let secret = format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    );
    let token = format!("{}_{}_{}", TOKEN_PREFIX, prefix, secret);
    let salt = Uuid::new_v4().simple().to_string();
    let hash = hash_token(&salt, &token, pepper);

    IssuedToken {
        token,
        prefix,
        salt,
        hash,
    }
}

pub fn hash_token(salt: &str, token: &str, pepper: Option<&str>) -> String {
    let key = format!("{}{}", salt, pepper.unwrap_or(""));
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Extracts the lookup prefix from a well-formed token.
pub fn parse_prefix(token: &str) -> Option<&str> {
    let rest = token.strip_prefix(TOKEN_PREFIX)?.strip_prefix('_')?;
    let (prefix, secret) = rest.split_once('_')?;
    let well_formed = prefix.len() == PREFIX_LEN
        && prefix.bytes().all(|b| b.is_ascii_hexdigit())
        && !secret.is_empty();
    well_formed.then_some(prefix)
}

pub fn verify_token(token: &str, salt: &str, expected_hash: &str, pepper: Option<&str>) -> bool {
    let actual = hash_token(salt, token, pepper);
    !actual.is_empty() && bool::from(actual.as_bytes().ct_eq(expected_hash.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_verifies() {
        let issued = generate_token(None);
        assert!(issued.token.starts_with("ek_"));
        assert_eq!(parse_prefix(&issued.token), Some(issued.prefix.as_str()));
        assert!(verify_token(&issued.token, &issued.salt, &issued.hash, None));
    }

    #[test]
    fn test_pepper_changes_hash() {
        let issued = generate_token(Some("pepper"));
        assert!(verify_token(&issued.token, &issued.salt, &issued.hash, Some("pepper")));
        assert!(!verify_token(&issued.token, &issued.salt, &issued.hash, None));
    }

    #[test]
    fn test_wrong_token_rejected() {
        let issued = generate_token(None);
        let forged = format!("{}x", issued.token);
        assert!(!verify_token(&forged, &issued.salt, &issued.hash, None));
    }

    #[test]
    fn test_parse_prefix_rejects_malformed() {
        assert_eq!(parse_prefix("ek_abcd1234_secret"), Some("abcd1234"));
        assert_eq!(parse_prefix("ek_abcd_secret"), None);
        assert_eq!(parse_prefix("xx_abcd1234_secret"), None);
        assert_eq!(parse_prefix("ek_abcd1234_"), None);
        assert_eq!(parse_prefix("plain-legacy-key"), None);
    }
}
