use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::models::{Proof, ProofKind, ProofStatus};
use crate::common::utils::fingerprint::normalize_content_hash;
use crate::common::{AppError, AppResult, EscrowId, MilestoneId, Money, ProofId};
use crate::domains::escrow::EscrowStatus;
use crate::domains::milestones::MilestoneStatus;
use crate::domains::payments::PaymentData;
use crate::kernel::RiskLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitProofRequest {
    pub escrow_id: EscrowId,
    pub milestone_idx: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub storage_url: String,
    pub sha256: String,
    #[serde(default)]
    pub metadata: Option<Map<String, JsonValue>>,
}

impl SubmitProofRequest {
    /// Returns the parsed kind and the normalised content hash.
    pub fn validate(&self) -> AppResult<(ProofKind, String)> {
        let kind: ProofKind = self
            .kind
            .parse()
            .map_err(|e: String| AppError::bad_request("INVALID_PAYLOAD", e))?;
        if self.milestone_idx < 1 {
            return Err(AppError::bad_request("INVALID_PAYLOAD", "milestone_idx must be >= 1"));
        }
        let url = self.storage_url.trim();
        let supported = ["https://", "http://", "s3://"]
            .iter()
            .any(|scheme| url.starts_with(scheme));
        if !supported {
            return Err(AppError::bad_request(
                "INVALID_PAYLOAD",
                "storage_url must be an http(s) or s3 URL",
            ));
        }
        let hash = normalize_content_hash(&self.sha256);
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::bad_request(
                "INVALID_PAYLOAD",
                "sha256 must be 64 hex characters",
            ));
        }
        Ok((kind, hash))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofDecisionRequest {
    pub decision: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl ProofDecisionRequest {
    pub fn decision(&self) -> AppResult<Decision> {
        match self.decision.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(Decision::Approve),
            "reject" => Ok(Decision::Reject),
            _ => Err(AppError::bad_request(
                "INVALID_DECISION",
                "decision must be 'approve' or 'reject'",
            )),
        }
    }

    /// Trimmed note, `None` when blank.
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiReviewData {
    pub risk_level: Option<RiskLevel>,
    pub score: Option<f64>,
    pub flags: Option<JsonValue>,
    pub explanation: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofData {
    pub id: ProofId,
    pub escrow_id: EscrowId,
    pub milestone_id: MilestoneId,
    #[serde(rename = "type")]
    pub kind: ProofKind,
    pub storage_url: String,
    pub sha256: String,
    pub metadata: JsonValue,
    pub rule_flags: JsonValue,
    pub status: ProofStatus,
    pub invoice_total: Option<Money>,
    pub invoice_currency: Option<String>,
    pub ai: AiReviewData,
    pub reviewer: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Proof> for ProofData {
    fn from(p: Proof) -> Self {
        Self {
            id: p.id,
            escrow_id: p.escrow_id,
            milestone_id: p.milestone_id,
            kind: p.kind,
            storage_url: p.storage_url,
            sha256: p.content_hash,
            metadata: p.metadata,
            rule_flags: p.rule_flags,
            status: p.status,
            invoice_total: p.invoice_total,
            invoice_currency: p.invoice_currency,
            ai: AiReviewData {
                risk_level: p.ai_risk_level,
                score: p.ai_score,
                flags: p.ai_flags,
                explanation: p.ai_explanation,
                checked_at: p.ai_checked_at,
            },
            reviewer: p.reviewer,
            reviewed_at: p.reviewed_at,
            review_note: p.review_note,
            created_at: p.created_at,
        }
    }
}

/// What a proof submission or decision did to the escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofOutcome {
    pub proof: ProofData,
    pub milestone_status: MilestoneStatus,
    pub escrow_status: EscrowStatus,
    pub payment: Option<PaymentData>,
}
