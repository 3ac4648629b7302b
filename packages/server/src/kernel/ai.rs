// Proof advisor implementations
//
// The advisor is advisory only: its output is stored on the proof and
// surfaced to reviewers, but never blocks or approves anything by itself.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics};
use super::traits::{AdvisorAssessment, BaseProofAdvisor, RiskLevel};

// =============================================================================
// Stub advisor (deterministic heuristics, no network)
// =============================================================================

/// Heuristic advisor used until a real model is wired in.
///
/// Scores the sanitised context by looking at rule flags raised by the
/// deterministic checks and a few metadata hints.
pub struct StubProofAdvisor {
    model: String,
}

impl StubProofAdvisor {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl BaseProofAdvisor for StubProofAdvisor {
    fn model(&self) -> &str {
        &self.model
    }

    async fn assess(&self, context: &JsonValue) -> Result<AdvisorAssessment> {
        let mut flags: Vec<String> = context
            .get("rule_flags")
            .and_then(|f| f.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .map(|s| s.to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default();

        let metadata = context.get("metadata");
        let edited = metadata
            .and_then(|m| m.get("software"))
            .and_then(|s| s.as_str())
            .map(|s| {
                let s = s.to_ascii_lowercase();
                s.contains("photoshop") || s.contains("gimp")
            })
            .unwrap_or(false);
        if edited {
            flags.push("edited_image".to_string());
        }

        let (risk_level, score, explanation) = if edited {
            (
                RiskLevel::Critical,
                0.9,
                "image metadata indicates editing software",
            )
        } else if !flags.is_empty() {
            (
                RiskLevel::Warning,
                0.4,
                "deterministic checks raised soft flags",
            )
        } else {
            (RiskLevel::Ok, 0.1, "no anomalies detected")
        };

        Ok(AdvisorAssessment {
            risk_level,
            score,
            flags,
            explanation: explanation.to_string(),
        })
    }
}

// =============================================================================
// Guarded advisor service (timeout + breaker + fallback)
// =============================================================================

#[derive(Debug, Default)]
struct AdvisorCounters {
    calls: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    fallbacks: AtomicU64,
}

/// Snapshot for the health view.
#[derive(Debug, Clone, Serialize)]
pub struct AdvisorStatus {
    pub enabled: bool,
    pub model: String,
    pub calls: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub fallbacks: u64,
    pub breaker: CircuitBreakerMetrics,
}

/// Wraps an advisor with a per-call timeout and a circuit breaker.
///
/// Every failure mode (error, timeout, open circuit) collapses into
/// [`AdvisorAssessment::unavailable`].
#[derive(Clone)]
pub struct ProofAdvisorService {
    inner: Arc<dyn BaseProofAdvisor>,
    enabled: bool,
    timeout: Duration,
    breaker: CircuitBreaker,
    counters: Arc<AdvisorCounters>,
}

impl ProofAdvisorService {
    pub fn new(
        inner: Arc<dyn BaseProofAdvisor>,
        enabled: bool,
        timeout: Duration,
        breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            inner,
            enabled,
            timeout,
            breaker: CircuitBreaker::new(breaker),
            counters: Arc::new(AdvisorCounters::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    /// Returns `None` when the advisor is disabled.
    pub async fn assess(&self, context: &JsonValue) -> Option<AdvisorAssessment> {
        if !self.enabled {
            return None;
        }
        self.counters.calls.fetch_add(1, Ordering::Relaxed);

        if !self.breaker.is_request_allowed().await {
            debug!("proof advisor circuit open, using fallback");
            self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
            return Some(AdvisorAssessment::unavailable());
        }

        match tokio::time::timeout(self.timeout, self.inner.assess(context)).await {
            Ok(Ok(mut assessment)) => {
                self.breaker.record_success().await;
                assessment.score = assessment.score.clamp(0.0, 1.0);
                Some(assessment)
            }
            Ok(Err(e)) => {
                warn!(error = %e, model = %self.inner.model(), "proof advisor failed");
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                self.fallback().await
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "proof advisor timed out");
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                self.fallback().await
            }
        }
    }

    async fn fallback(&self) -> Option<AdvisorAssessment> {
        self.breaker.record_failure().await;
        self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
        Some(AdvisorAssessment::unavailable())
    }

    pub async fn status(&self) -> AdvisorStatus {
        AdvisorStatus {
            enabled: self.enabled,
            model: self.inner.model().to_string(),
            calls: self.counters.calls.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
            breaker: self.breaker.get_metrics().await,
        }
    }
}
