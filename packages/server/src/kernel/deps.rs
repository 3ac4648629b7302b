//! Server dependencies for use cases (using traits for testability)
//!
//! This module provides the central dependency container used by all domain
//! actions. External services sit behind `Base*` traits so tests can swap them.

use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::common::clock::{BaseClock, SystemClock};
use crate::config::Config;
use crate::kernel::ai::{ProofAdvisorService, StubProofAdvisor};
use crate::kernel::circuit_breaker::CircuitBreakerConfig;
use crate::kernel::ocr::{InvoiceOcrService, StubInvoiceOcr};
use crate::kernel::psp::StubPspClient;
use crate::kernel::secrets::ConfigSecretsProvider;
use crate::kernel::{BasePspClient, BaseSecretsProvider};

/// Timeout applied to every outbound PSP call.
pub const PSP_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// In-process scheduler bookkeeping shared with the health view.
#[derive(Clone)]
pub struct SchedulerState {
    /// Lease owner identity of this process
    pub instance_id: String,
    running: Arc<AtomicBool>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            instance_id: format!("escrow-{}", Uuid::new_v4()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to actions (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub clock: Arc<dyn BaseClock>,
    pub secrets: Arc<dyn BaseSecretsProvider>,
    pub psp: Arc<dyn BasePspClient>,
    pub ocr: InvoiceOcrService,
    pub advisor: ProofAdvisorService,
    pub scheduler: SchedulerState,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: PgPool,
        config: Arc<Config>,
        clock: Arc<dyn BaseClock>,
        secrets: Arc<dyn BaseSecretsProvider>,
        psp: Arc<dyn BasePspClient>,
        ocr: InvoiceOcrService,
        advisor: ProofAdvisorService,
        scheduler: SchedulerState,
    ) -> Self {
        Self {
            db_pool,
            config,
            clock,
            secrets,
            psp,
            ocr,
            advisor,
            scheduler,
        }
    }

    /// Production wiring: system clock, config-backed secrets and the stub
    /// PSP, OCR and advisor adapters behind their breakers.
    pub fn from_config(db_pool: PgPool, config: Config) -> Self {
        let breaker = CircuitBreakerConfig {
            failure_threshold: config.ai_breaker_threshold,
            cooldown: config.ai_breaker_cooldown,
        };
        let ocr = InvoiceOcrService::new(
            Arc::new(StubInvoiceOcr::new(config.invoice_ocr_provider.clone())),
            config.invoice_ocr_enabled,
            config.ai_proof_timeout,
            breaker,
        );
        let advisor = ProofAdvisorService::new(
            Arc::new(StubProofAdvisor::new(config.ai_proof_advisor_model.clone())),
            config.ai_proof_advisor_enabled,
            config.ai_proof_timeout,
            breaker,
        );

        Self::new(
            db_pool,
            Arc::new(config.clone()),
            Arc::new(SystemClock),
            Arc::new(ConfigSecretsProvider::new(config)),
            Arc::new(StubPspClient::new()),
            ocr,
            advisor,
            SchedulerState::new(),
        )
    }
}
