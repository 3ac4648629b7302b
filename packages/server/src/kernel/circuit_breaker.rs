//! Consecutive-failure circuit breaker guarding advisory integrations (AI, OCR).
//!
//! Closed → Open after `failure_threshold` consecutive failures. After
//! `cooldown` a single trial call is let through (HalfOpen); its outcome
//! closes or re-opens the circuit.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

/// Counters exposed on the health view.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    pub consecutive_failures: u32,
    pub trip_count: u64,
}

struct BreakerState {
    config: CircuitBreakerConfig,
    state: CircuitState,
    total_requests: u64,
    failed_requests: u64,
    rejected_requests: u64,
    consecutive_failures: u32,
    trip_count: u64,
    last_opened: Option<Instant>,
    half_open_in_flight: bool,
}

impl BreakerState {
    fn is_request_allowed(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = self
                    .last_opened
                    .map(|opened_at| opened_at.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if cooled_down {
                    self.state = CircuitState::HalfOpen;
                    self.half_open_in_flight = true;
                    true
                } else {
                    self.rejected_requests += 1;
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_in_flight {
                    self.rejected_requests += 1;
                    false
                } else {
                    self.half_open_in_flight = true;
                    true
                }
            }
        }
    }

    fn record_success(&mut self) {
        self.total_requests += 1;
        self.consecutive_failures = 0;
        self.half_open_in_flight = false;
        self.state = CircuitState::Closed;
    }

    fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.consecutive_failures += 1;
        self.half_open_in_flight = false;

        let trip = match self.state {
            CircuitState::Closed => self.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            self.state = CircuitState::Open;
            self.last_opened = Some(Instant::now());
            self.trip_count += 1;
        }
    }
}

#[derive(Clone)]
pub struct CircuitBreaker {
    state: Arc<RwLock<BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(BreakerState {
                config: CircuitBreakerConfig {
                    failure_threshold: config.failure_threshold.max(1),
                    cooldown: config.cooldown,
                },
                state: CircuitState::Closed,
                total_requests: 0,
                failed_requests: 0,
                rejected_requests: 0,
                consecutive_failures: 0,
                trip_count: 0,
                last_opened: None,
                half_open_in_flight: false,
            })),
        }
    }

    /// Returns false while the circuit is open; counts the rejection.
    pub async fn is_request_allowed(&self) -> bool {
        self.state.write().await.is_request_allowed()
    }

    pub async fn record_success(&self) {
        self.state.write().await.record_success();
    }

    pub async fn record_failure(&self) {
        self.state.write().await.record_failure();
    }

    pub async fn get_state(&self) -> CircuitState {
        self.state.read().await.state
    }

    pub async fn get_metrics(&self) -> CircuitBreakerMetrics {
        let s = self.state.read().await;
        CircuitBreakerMetrics {
            state: s.state,
            total_requests: s.total_requests,
            failed_requests: s.failed_requests,
            rejected_requests: s.rejected_requests,
            consecutive_failures: s.consecutive_failures,
            trip_count: s.trip_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_millis(cooldown_ms),
        })
    }

    #[tokio::test]
    async fn test_consecutive_failures_trip() {
        let cb = breaker(3, 60_000);
        for _ in 0..2 {
            assert!(cb.is_request_allowed().await);
            cb.record_failure().await;
        }
        assert_eq!(cb.get_state().await, CircuitState::Closed);

        cb.record_failure().await;
        assert_eq!(cb.get_state().await, CircuitState::Open);
        assert!(!cb.is_request_allowed().await);

        let metrics = cb.get_metrics().await;
        assert_eq!(metrics.trip_count, 1);
        assert_eq!(metrics.rejected_requests, 1);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let cb = breaker(2, 60_000);
        cb.record_failure().await;
        cb.record_success().await;
        cb.record_failure().await;
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_recovery() {
        let cb = breaker(1, 20);
        cb.record_failure().await;
        assert!(!cb.is_request_allowed().await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cb.is_request_allowed().await);
        assert_eq!(cb.get_state().await, CircuitState::HalfOpen);
        // Only one trial call at a time
        assert!(!cb.is_request_allowed().await);

        cb.record_success().await;
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(1, 20);
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cb.is_request_allowed().await);
        cb.record_failure().await;
        assert_eq!(cb.get_state().await, CircuitState::Open);
        assert_eq!(cb.get_metrics().await.trip_count, 2);
    }
}
