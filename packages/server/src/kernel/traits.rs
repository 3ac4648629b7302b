// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business rules (what a proof must satisfy, when a payout may be sent) live
// in the domains and call these traits.
//
// Naming convention: Base* for trait names (e.g., BasePspClient, BaseProofAdvisor)

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::common::{Currency, EscrowId, Money, PaymentId};

// =============================================================================
// Payment Service Provider Trait (Infrastructure)
// =============================================================================

/// Outbound payout instruction handed to the PSP.
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub escrow_id: EscrowId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub currency: Currency,
    /// Forwarded so the PSP can dedupe retries on its side
    pub idempotency_key: String,
}

#[async_trait]
pub trait BasePspClient: Send + Sync {
    /// Initiate a payout, returning the PSP reference.
    async fn create_payout(&self, request: &PayoutRequest) -> Result<String>;

    /// Open a funding intent for an escrow, returning the PSP intent id.
    async fn create_funding_intent(
        &self,
        escrow_id: EscrowId,
        amount: Money,
        currency: Currency,
    ) -> Result<String>;
}

// =============================================================================
// Invoice OCR Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseInvoiceOcr: Send + Sync {
    fn provider(&self) -> &str;

    /// Extract fields from a stored document. Keys follow the metadata
    /// conventions (`invoice_total`, `currency`, ...).
    async fn extract(&self, storage_url: &str, kind: &str) -> Result<Map<String, JsonValue>>;
}

// =============================================================================
// Proof Advisor Trait (Infrastructure - advisory AI)
// =============================================================================

/// Risk level reported by the advisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ai_risk_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Ok,
    Warning,
    Critical,
}

impl RiskLevel {
    /// Levels that oblige a human reviewer to leave a note.
    pub fn requires_review_note(self) -> bool {
        matches!(self, RiskLevel::Warning | RiskLevel::Critical)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorAssessment {
    pub risk_level: RiskLevel,
    /// 0.0 (benign) ..= 1.0 (certainly fraudulent)
    pub score: f64,
    pub flags: Vec<String>,
    pub explanation: String,
}

impl AdvisorAssessment {
    /// Conservative answer used when the advisor cannot be reached.
    pub fn unavailable() -> Self {
        Self {
            risk_level: RiskLevel::Warning,
            score: 0.5,
            flags: vec!["ai_unavailable".to_string()],
            explanation: "AI advisor unavailable; manual review recommended".to_string(),
        }
    }
}

#[async_trait]
pub trait BaseProofAdvisor: Send + Sync {
    fn model(&self) -> &str;

    /// Assess an already-sanitised proof context.
    async fn assess(&self, context: &JsonValue) -> Result<AdvisorAssessment>;
}

// =============================================================================
// Secrets Provider Trait (Infrastructure)
// =============================================================================

/// Webhook verification secrets for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookSecrets {
    pub primary: Option<String>,
    /// Rotation secret accepted alongside the primary
    pub next: Option<String>,
}

impl WebhookSecrets {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.next.is_none()
    }
}

pub trait BaseSecretsProvider: Send + Sync {
    fn webhook_secrets(&self, provider: &str) -> WebhookSecrets;
}
