use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::ApiKey;
use crate::common::{ApiKeyId, AppError, AppResult, Scope, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueApiKeyRequest {
    pub name: String,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl IssueApiKeyRequest {
    pub fn validate(&self) -> AppResult<Vec<Scope>> {
        if self.name.trim().is_empty() {
            return Err(AppError::bad_request("INVALID_PAYLOAD", "name is required"));
        }
        if self.scopes.is_empty() {
            return Err(AppError::bad_request(
                "INVALID_PAYLOAD",
                "at least one scope is required",
            ));
        }
        let mut scopes: Vec<Scope> = Vec::with_capacity(self.scopes.len());
        for raw in &self.scopes {
            let scope: Scope = raw
                .parse()
                .map_err(|e: String| AppError::bad_request("INVALID_PAYLOAD", e))?;
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        Ok(scopes)
    }
}

/// Response to a key issuance. `token` is returned exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedApiKeyData {
    pub id: ApiKeyId,
    pub name: String,
    pub prefix: String,
    pub scopes: Vec<String>,
    pub user_id: Option<UserId>,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl IssuedApiKeyData {
    pub fn new(key: ApiKey, token: String) -> Self {
        Self {
            id: key.id,
            name: key.name,
            prefix: key.prefix,
            scopes: key.scopes,
            user_id: key.user_id,
            token,
            created_at: key.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_are_parsed_and_deduped() {
        let request = IssueApiKeyRequest {
            name: "reviewer".to_string(),
            scopes: vec!["support".into(), "SUPPORT".into(), "sender".into()],
            user_id: None,
        };
        assert_eq!(request.validate().unwrap(), vec![Scope::Support, Scope::Sender]);
    }

    #[test]
    fn test_unknown_scope_rejected() {
        let request = IssueApiKeyRequest {
            name: "x".to_string(),
            scopes: vec!["root".into()],
            user_id: None,
        };
        assert!(request.validate().unwrap_err().is_code("INVALID_PAYLOAD"));
    }
}
