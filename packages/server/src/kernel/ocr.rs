// Invoice OCR adapter
//
// OCR only enriches proof metadata. A failed or disabled OCR call leaves the
// caller-supplied metadata untouched.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics};
use super::traits::BaseInvoiceOcr;

/// OCR stub: reports its provider and extracts nothing.
pub struct StubInvoiceOcr {
    provider: String,
}

impl StubInvoiceOcr {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

#[async_trait]
impl BaseInvoiceOcr for StubInvoiceOcr {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn extract(&self, _storage_url: &str, _kind: &str) -> Result<Map<String, JsonValue>> {
        let mut fields = Map::new();
        fields.insert(
            "ocr_provider".to_string(),
            JsonValue::String(self.provider.clone()),
        );
        Ok(fields)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrStatus {
    pub enabled: bool,
    pub provider: String,
    pub breaker: CircuitBreakerMetrics,
}

#[derive(Clone)]
pub struct InvoiceOcrService {
    inner: Arc<dyn BaseInvoiceOcr>,
    enabled: bool,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl InvoiceOcrService {
    pub fn new(
        inner: Arc<dyn BaseInvoiceOcr>,
        enabled: bool,
        timeout: Duration,
        breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            inner,
            enabled,
            timeout,
            breaker: CircuitBreaker::new(breaker),
        }
    }

    /// Merge OCR output into `metadata` without overwriting caller keys.
    ///
    /// Returns the list of keys that were added.
    pub async fn enrich(
        &self,
        storage_url: &str,
        kind: &str,
        metadata: &mut Map<String, JsonValue>,
    ) -> Vec<String> {
        if !self.enabled || !self.breaker.is_request_allowed().await {
            return Vec::new();
        }

        let extracted = match tokio::time::timeout(self.timeout, self.inner.extract(storage_url, kind))
            .await
        {
            Ok(Ok(fields)) => {
                self.breaker.record_success().await;
                fields
            }
            Ok(Err(e)) => {
                warn!(error = %e, provider = %self.inner.provider(), "invoice OCR failed");
                self.breaker.record_failure().await;
                return Vec::new();
            }
            Err(_) => {
                warn!(provider = %self.inner.provider(), "invoice OCR timed out");
                self.breaker.record_failure().await;
                return Vec::new();
            }
        };

        let mut added = Vec::new();
        for (key, value) in extracted {
            if !metadata.contains_key(&key) {
                metadata.insert(key.clone(), value);
                added.push(key);
            }
        }
        added
    }

    pub async fn status(&self) -> OcrStatus {
        OcrStatus {
            enabled: self.enabled,
            provider: self.inner.provider().to_string(),
            breaker: self.breaker.get_metrics().await,
        }
    }
}
