use super::Scope;
use crate::common::errors::{AppError, AppResult};
use crate::common::{ApiKeyId, UserId};

/// How the caller authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(ApiKeyId),
    /// The shared `API_KEY` from the environment (dev environments only)
    Legacy,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub name: String,
    pub scopes: Vec<Scope>,
    pub user_id: Option<UserId>,
    pub credential: Credential,
}

impl Principal {
    pub fn legacy() -> Self {
        Self {
            name: "legacy".to_string(),
            scopes: vec![Scope::Admin],
            user_id: None,
            credential: Credential::Legacy,
        }
    }

    pub fn has(&self, required: Scope) -> bool {
        self.scopes.iter().any(|s| s.grants(required))
    }

    pub fn require(&self, required: Scope) -> AppResult<()> {
        if self.has(required) {
            Ok(())
        } else {
            Err(AppError::forbidden(
                "INSUFFICIENT_SCOPE",
                format!("scope '{}' is required", required),
            ))
        }
    }

    /// Actor label written to the audit log.
    pub fn actor(&self) -> String {
        match &self.credential {
            Credential::ApiKey(id) => format!("api_key:{}:{}", id, self.name),
            Credential::Legacy => "legacy_api_key".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Principal {
        Principal {
            name: "ops-bot".to_string(),
            scopes: vec![Scope::Sender],
            user_id: None,
            credential: Credential::ApiKey(ApiKeyId::new(3)),
        }
    }

    #[test]
    fn test_require_scope() {
        let p = sender();
        assert!(p.require(Scope::Sender).is_ok());
        let err = p.require(Scope::Admin).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_SCOPE");
    }

    #[test]
    fn test_legacy_is_admin() {
        let p = Principal::legacy();
        assert!(p.has(Scope::Support));
        assert_eq!(p.actor(), "legacy_api_key");
    }

    #[test]
    fn test_actor_label() {
        assert_eq!(sender().actor(), "api_key:3:ops-bot");
    }
}
