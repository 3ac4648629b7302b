use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Deployment environment, from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Dev,
    Local,
    DevLocal,
    Test,
    Staging,
    Production,
}

impl AppEnv {
    /// Environments in which the legacy shared `API_KEY` is honoured.
    pub fn allows_legacy_key(self) -> bool {
        matches!(self, AppEnv::Dev | AppEnv::Local | AppEnv::DevLocal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppEnv::Dev => "dev",
            AppEnv::Local => "local",
            AppEnv::DevLocal => "dev_local",
            AppEnv::Test => "test",
            AppEnv::Staging => "staging",
            AppEnv::Production => "production",
        }
    }
}

impl FromStr for AppEnv {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(AppEnv::Dev),
            "local" => Ok(AppEnv::Local),
            "dev_local" | "dev-local" => Ok(AppEnv::DevLocal),
            "test" => Ok(AppEnv::Test),
            "staging" => Ok(AppEnv::Staging),
            "prod" | "production" => Ok(AppEnv::Production),
            other => bail!("unknown APP_ENV '{}'", other),
        }
    }
}

/// What to do when an idempotency key is replayed with a different request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyMismatchPolicy {
    /// Answer 409 `IDEMPOTENCY_KEY_CONFLICT`.
    Reject,
    /// Return the stored result anyway.
    Relaxed,
}

impl FromStr for IdempotencyMismatchPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "strict" => Ok(Self::Reject),
            "relaxed" | "ignore" => Ok(Self::Relaxed),
            other => bail!("unknown IDEMPOTENCY_MISMATCH_POLICY '{}'", other),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub app_env: AppEnv,

    /// Legacy shared admin key (dev environments only)
    pub legacy_api_key: Option<String>,
    /// Extra HMAC input mixed into API token hashes
    pub api_key_pepper: Option<String>,

    pub psp_webhook_secret: Option<String>,
    pub psp_webhook_secret_next: Option<String>,
    pub psp_webhook_max_drift_seconds: i64,
    pub stripe_enabled: bool,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,

    pub ai_proof_advisor_enabled: bool,
    pub ai_proof_advisor_model: String,
    pub ai_proof_timeout: Duration,
    pub ai_breaker_threshold: u32,
    pub ai_breaker_cooldown: Duration,

    pub invoice_ocr_enabled: bool,
    pub invoice_ocr_provider: String,

    pub idempotency_mismatch_policy: IdempotencyMismatchPolicy,

    pub scheduler_enabled: bool,
    pub scheduler_tick: Duration,
    pub scheduler_lock_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Test override hook: tests pass a closure over a `HashMap` instead of
    /// mutating the process environment.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_or(&var, "PORT", 8080)?,
            app_env: match var("APP_ENV") {
                Some(raw) => raw.parse().context("APP_ENV must be a known environment")?,
                None => AppEnv::Production,
            },

            legacy_api_key: var("API_KEY"),
            api_key_pepper: var("API_KEY_PEPPER"),

            psp_webhook_secret: var("PSP_WEBHOOK_SECRET"),
            psp_webhook_secret_next: var("PSP_WEBHOOK_SECRET_NEXT"),
            psp_webhook_max_drift_seconds: parse_or(&var, "PSP_WEBHOOK_MAX_DRIFT_SECONDS", 300)?,
            stripe_enabled: flag(&var, "STRIPE_ENABLED", false)?,
            stripe_secret_key: var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET"),

            ai_proof_advisor_enabled: flag(&var, "AI_PROOF_ADVISOR_ENABLED", false)?,
            ai_proof_advisor_model: var("AI_PROOF_ADVISOR_MODEL")
                .unwrap_or_else(|| "stub-advisor-v1".to_string()),
            ai_proof_timeout: Duration::from_secs(parse_or(&var, "AI_PROOF_TIMEOUT_SECONDS", 5)?),
            ai_breaker_threshold: parse_or(&var, "AI_BREAKER_THRESHOLD", 3)?,
            ai_breaker_cooldown: Duration::from_secs(parse_or(
                &var,
                "AI_BREAKER_COOLDOWN_SECONDS",
                30,
            )?),

            invoice_ocr_enabled: flag(&var, "INVOICE_OCR_ENABLED", false)?,
            invoice_ocr_provider: var("INVOICE_OCR_PROVIDER").unwrap_or_else(|| "stub".to_string()),

            idempotency_mismatch_policy: match var("IDEMPOTENCY_MISMATCH_POLICY") {
                Some(raw) => raw
                    .parse()
                    .context("IDEMPOTENCY_MISMATCH_POLICY must be reject or relaxed")?,
                None => IdempotencyMismatchPolicy::Reject,
            },

            scheduler_enabled: flag(&var, "SCHEDULER_ENABLED", true)?,
            scheduler_tick: Duration::from_secs(parse_or(&var, "SCHEDULER_TICK_SECONDS", 30)?),
            scheduler_lock_ttl: Duration::from_secs(parse_or(
                &var,
                "SCHEDULER_LOCK_TTL_SECONDS",
                90,
            )?),
        })
    }

    /// Secret used to verify webhooks from `provider`, plus the rotation secret.
    pub fn webhook_secrets(&self, provider: &str) -> (Option<&str>, Option<&str>) {
        let primary = if provider.eq_ignore_ascii_case("stripe") && self.stripe_enabled {
            self.stripe_webhook_secret.as_deref()
        } else {
            self.psp_webhook_secret.as_deref()
        };
        (primary, self.psp_webhook_secret_next.as_deref())
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        None => Ok(default),
    }
}

fn flag<F>(var: &F, name: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => bail!("{} must be a boolean, got '{}'", name, other),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/escrow")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.app_env, AppEnv::Production);
        assert_eq!(config.psp_webhook_max_drift_seconds, 300);
        assert_eq!(config.ai_proof_timeout, Duration::from_secs(5));
        assert_eq!(config.ai_breaker_threshold, 3);
        assert_eq!(config.ai_proof_advisor_model, "stub-advisor-v1");
        assert_eq!(config.invoice_ocr_provider, "stub");
        assert_eq!(
            config.idempotency_mismatch_policy,
            IdempotencyMismatchPolicy::Reject
        );
        assert!(config.scheduler_enabled);
        assert!(!config.stripe_enabled);
        assert!(config.legacy_api_key.is_none());
    }

    #[test]
    fn test_database_url_required() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/escrow"),
            ("PSP_WEBHOOK_SECRET", "   "),
        ])
        .unwrap();
        assert!(config.psp_webhook_secret.is_none());
    }

    #[test]
    fn test_invalid_port_fails() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/escrow"),
            ("PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_legacy_key_environments() {
        assert!(AppEnv::Dev.allows_legacy_key());
        assert!(AppEnv::Local.allows_legacy_key());
        assert!(AppEnv::DevLocal.allows_legacy_key());
        assert!(!AppEnv::Test.allows_legacy_key());
        assert!(!AppEnv::Staging.allows_legacy_key());
        assert!(!AppEnv::Production.allows_legacy_key());
    }

    #[test]
    fn test_stripe_secret_selection() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/escrow"),
            ("PSP_WEBHOOK_SECRET", "psp-primary"),
            ("PSP_WEBHOOK_SECRET_NEXT", "psp-next"),
            ("STRIPE_ENABLED", "true"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_stripe"),
        ])
        .unwrap();

        assert_eq!(
            config.webhook_secrets("psp"),
            (Some("psp-primary"), Some("psp-next"))
        );
        assert_eq!(
            config.webhook_secrets("stripe"),
            (Some("whsec_stripe"), Some("psp-next"))
        );
    }

    #[test]
    fn test_relaxed_policy() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/escrow"),
            ("IDEMPOTENCY_MISMATCH_POLICY", "relaxed"),
            ("APP_ENV", "dev_local"),
        ])
        .unwrap();
        assert_eq!(
            config.idempotency_mismatch_policy,
            IdempotencyMismatchPolicy::Relaxed
        );
        assert_eq!(config.app_env, AppEnv::DevLocal);
    }
}
