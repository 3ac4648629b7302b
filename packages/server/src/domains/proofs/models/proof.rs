use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;

use crate::common::{EscrowId, MilestoneId, Money, ProofId};
use crate::kernel::{AdvisorAssessment, RiskLevel};

/// Kind of evidence a proof carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "proof_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ProofKind {
    Photo,
    Pdf,
    Invoice,
    Contract,
}

impl ProofKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProofKind::Photo => "PHOTO",
            ProofKind::Pdf => "PDF",
            ProofKind::Invoice => "INVOICE",
            ProofKind::Contract => "CONTRACT",
        }
    }

    /// Documents go through OCR enrichment instead of the photo rules.
    pub fn is_document(self) -> bool {
        !matches!(self, ProofKind::Photo)
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PHOTO" => Ok(ProofKind::Photo),
            "PDF" => Ok(ProofKind::Pdf),
            "INVOICE" => Ok(ProofKind::Invoice),
            "CONTRACT" => Ok(ProofKind::Contract),
            other => Err(format!("unknown proof kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "proof_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ProofStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Proof {
    pub id: ProofId,
    pub escrow_id: EscrowId,
    pub milestone_id: MilestoneId,
    pub kind: ProofKind,
    pub storage_url: String,
    pub content_hash: String,
    pub metadata: JsonValue,
    pub rule_flags: JsonValue,
    pub status: ProofStatus,
    pub invoice_total: Option<Money>,
    pub invoice_currency: Option<String>,
    pub ai_risk_level: Option<RiskLevel>,
    pub ai_score: Option<f64>,
    pub ai_flags: Option<JsonValue>,
    pub ai_explanation: Option<String>,
    pub ai_checked_at: Option<DateTime<Utc>>,
    pub reviewer: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a proof
#[derive(Clone, Debug, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewProof {
    pub escrow_id: EscrowId,
    pub milestone_id: MilestoneId,
    pub kind: ProofKind,
    pub storage_url: String,
    pub content_hash: String,
    pub metadata: JsonValue,
    pub rule_flags: Vec<String>,
    pub status: ProofStatus,
    #[builder(default)]
    pub invoice_total: Option<Money>,
    #[builder(default)]
    pub invoice_currency: Option<String>,
    #[builder(default)]
    pub assessment: Option<AdvisorAssessment>,
    #[builder(default)]
    pub ai_checked_at: Option<DateTime<Utc>>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Proof {
    /// Insert a proof; `None` when the content hash was already submitted.
    pub async fn create(new: &NewProof, conn: &mut PgConnection) -> Result<Option<Self>> {
        let assessment = new.assessment.as_ref();
        let proof = sqlx::query_as::<_, Proof>(
            r#"
            INSERT INTO proofs (
                escrow_id,
                milestone_id,
                kind,
                storage_url,
                content_hash,
                metadata,
                rule_flags,
                status,
                invoice_total,
                invoice_currency,
                ai_risk_level,
                ai_score,
                ai_flags,
                ai_explanation,
                ai_checked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (content_hash) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new.escrow_id)
        .bind(new.milestone_id)
        .bind(new.kind)
        .bind(&new.storage_url)
        .bind(&new.content_hash)
        .bind(&new.metadata)
        .bind(serde_json::to_value(&new.rule_flags)?)
        .bind(new.status)
        .bind(new.invoice_total)
        .bind(&new.invoice_currency)
        .bind(assessment.map(|a| a.risk_level))
        .bind(assessment.map(|a| a.score))
        .bind(assessment.map(|a| serde_json::json!(a.flags)))
        .bind(assessment.map(|a| a.explanation.clone()))
        .bind(new.ai_checked_at)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(proof)
    }

    pub async fn find_by_id(id: ProofId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let proof = sqlx::query_as::<_, Proof>("SELECT * FROM proofs WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(proof)
    }

    pub async fn lock_by_id(id: ProofId, conn: &mut PgConnection) -> Result<Option<Self>> {
        let proof = sqlx::query_as::<_, Proof>("SELECT * FROM proofs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(proof)
    }

    pub async fn list_for_milestone(
        milestone_id: MilestoneId,
        conn: &mut PgConnection,
    ) -> Result<Vec<Self>> {
        let proofs = sqlx::query_as::<_, Proof>(
            "SELECT * FROM proofs WHERE milestone_id = $1 ORDER BY id",
        )
        .bind(milestone_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(proofs)
    }

    /// Record a reviewer's decision on a PENDING proof.
    pub async fn decide(
        id: ProofId,
        status: ProofStatus,
        reviewer: &str,
        note: Option<&str>,
        reviewed_at: DateTime<Utc>,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let proof = sqlx::query_as::<_, Proof>(
            r#"
            UPDATE proofs
            SET status = $2, reviewer = $3, review_note = $4, reviewed_at = $5
            WHERE id = $1 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(reviewer)
        .bind(note)
        .bind(reviewed_at)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!("photo".parse::<ProofKind>().unwrap(), ProofKind::Photo);
        assert_eq!(" Invoice ".parse::<ProofKind>().unwrap(), ProofKind::Invoice);
        assert!("video".parse::<ProofKind>().is_err());
        assert!(ProofKind::Pdf.is_document());
        assert!(!ProofKind::Photo.is_document());
    }
}
