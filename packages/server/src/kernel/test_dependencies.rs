// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use super::ai::{ProofAdvisorService, StubProofAdvisor};
use super::circuit_breaker::CircuitBreakerConfig;
use super::deps::SchedulerState;
use super::ocr::{InvoiceOcrService, StubInvoiceOcr};
use super::{
    BaseProofAdvisor, BasePspClient, BaseSecretsProvider, PayoutRequest, ServerDeps,
    WebhookSecrets,
};
use crate::common::{Currency, EscrowId, FixedClock, Money};
use crate::config::Config;

// =============================================================================
// Mock PSP
// =============================================================================

/// PSP double that records payouts and can be switched into failure mode.
#[derive(Default)]
pub struct MockPspClient {
    failing: AtomicBool,
    payouts: Mutex<Vec<PayoutRequest>>,
    intents: Mutex<Vec<(EscrowId, Money)>>,
}

impl MockPspClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails until switched back.
    pub fn failing() -> Self {
        let psp = Self::default();
        psp.set_failing(true);
        psp
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn payouts(&self) -> Vec<PayoutRequest> {
        self.payouts.lock().unwrap().clone()
    }

    pub fn payout_count(&self) -> usize {
        self.payouts.lock().unwrap().len()
    }

    pub fn intent_count(&self) -> usize {
        self.intents.lock().unwrap().len()
    }

    /// References are unique across mocks since tests share one database.
    fn next_ref(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4().simple())
    }
}

#[async_trait]
impl BasePspClient for MockPspClient {
    async fn create_payout(&self, request: &PayoutRequest) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("mock PSP unavailable");
        }
        self.payouts.lock().unwrap().push(request.clone());
        Ok(self.next_ref("mock-psp"))
    }

    async fn create_funding_intent(
        &self,
        escrow_id: EscrowId,
        amount: Money,
        _currency: Currency,
    ) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("mock PSP unavailable");
        }
        self.intents.lock().unwrap().push((escrow_id, amount));
        Ok(self.next_ref("mock-fi"))
    }
}

// =============================================================================
// Static secrets
// =============================================================================

pub struct StaticSecrets(pub WebhookSecrets);

impl BaseSecretsProvider for StaticSecrets {
    fn webhook_secrets(&self, _provider: &str) -> WebhookSecrets {
        self.0.clone()
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Builder for a [`ServerDeps`] wired with test doubles.
pub struct TestDependencies {
    pub psp: Arc<MockPspClient>,
    pub clock: Arc<FixedClock>,
    pub secrets: WebhookSecrets,
    pub advisor: Option<Arc<dyn BaseProofAdvisor>>,
    pub config: Config,
}

impl TestDependencies {
    pub fn new(now: DateTime<Utc>) -> Self {
        let config = Config::from_vars(|name| match name {
            "DATABASE_URL" => Some("postgres://unused/escrow_test".to_string()),
            "APP_ENV" => Some("test".to_string()),
            "SCHEDULER_ENABLED" => Some("false".to_string()),
            _ => None,
        })
        .unwrap_or_else(|e| panic!("test config must load: {e}"));

        Self {
            psp: Arc::new(MockPspClient::new()),
            clock: Arc::new(FixedClock::new(now)),
            secrets: WebhookSecrets {
                primary: Some("whsec_test".to_string()),
                next: None,
            },
            advisor: None,
            config,
        }
    }

    pub fn with_psp(mut self, psp: MockPspClient) -> Self {
        self.psp = Arc::new(psp);
        self
    }

    pub fn with_secrets(mut self, secrets: WebhookSecrets) -> Self {
        self.secrets = secrets;
        self
    }

    /// Enable the proof advisor with the given implementation.
    pub fn with_advisor(mut self, advisor: Arc<dyn BaseProofAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn with_config(mut self, edit: impl FnOnce(&mut Config)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn into_server_deps(self, db_pool: PgPool) -> ServerDeps {
        let breaker = CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        };
        let advisor = match self.advisor {
            Some(inner) => ProofAdvisorService::new(inner, true, Duration::from_secs(1), breaker),
            None => ProofAdvisorService::new(
                Arc::new(StubProofAdvisor::new("stub-advisor-v1")),
                false,
                Duration::from_secs(1),
                breaker,
            ),
        };
        let ocr = InvoiceOcrService::new(
            Arc::new(StubInvoiceOcr::new("stub")),
            false,
            Duration::from_secs(1),
            breaker,
        );

        ServerDeps::new(
            db_pool,
            Arc::new(self.config),
            self.clock,
            Arc::new(StaticSecrets(self.secrets)),
            self.psp,
            ocr,
            advisor,
            SchedulerState::new(),
        )
    }
}
