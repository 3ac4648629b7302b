use serde_json::{json, Value as JsonValue};
use tracing::{info, instrument};

use super::release::release_milestone;
use crate::common::{AppError, AppResult, Principal};
use crate::domains::audit;
use crate::domains::escrow::actions::escrow_not_found;
use crate::domains::escrow::models::{Escrow, EscrowEvent as EscrowEventRow, EscrowEventKind};
use crate::domains::milestones::machines::{next_status, MilestoneEvent};
use crate::domains::milestones::models::{Milestone, MilestoneStatus};
use crate::domains::proofs::advisor_context::build_context;
use crate::domains::proofs::data::{ProofOutcome, SubmitProofRequest};
use crate::domains::proofs::invoice::normalize_invoice;
use crate::domains::proofs::models::{NewProof, Proof, ProofKind, ProofStatus};
use crate::domains::proofs::rules::evaluate_photo;
use crate::kernel::{RiskLevel, ServerDeps};

pub const FLAG_PROOF_KIND_MISMATCH: &str = "PROOF_KIND_MISMATCH";

/// Validator value that sends every proof of a milestone to a human.
pub const MANUAL_VALIDATOR: &str = "manual";

/// Take in a proof for the escrow's current milestone.
///
/// OCR and the advisor run before the transaction opens. A photo that passes
/// every rule is approved and paid out immediately; anything else waits for
/// review.
#[instrument(skip(request, principal, deps), fields(escrow_id = %request.escrow_id, milestone_idx = request.milestone_idx))]
pub async fn submit_proof(
    request: SubmitProofRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<ProofOutcome> {
    let (kind, content_hash) = request.validate()?;
    let actor = principal.actor();
    let now = deps.clock.now();

    let milestone = {
        let mut conn = deps.db_pool.acquire().await?;
        let escrow = Escrow::find_by_id(request.escrow_id, &mut *conn)
            .await?
            .ok_or_else(|| escrow_not_found(request.escrow_id))?;
        if escrow.status.is_terminal() {
            return Err(AppError::invalid_escrow_state(format!(
                "escrow is {}",
                escrow.status.as_str()
            )));
        }
        Milestone::find_by_escrow_and_idx(escrow.id, request.milestone_idx, &mut *conn)
            .await?
            .ok_or_else(|| {
                AppError::not_found(
                    "MILESTONE_NOT_FOUND",
                    format!("milestone {} not found", request.milestone_idx),
                )
            })?
    };

    let mut metadata = request.metadata.clone().unwrap_or_default();
    let mut flags: Vec<String> = Vec::new();
    let mut invoice = None;

    if kind.is_document() {
        let added = deps
            .ocr
            .enrich(&request.storage_url, kind.as_str(), &mut metadata)
            .await;
        if !added.is_empty() {
            info!(fields = ?added, "OCR enriched proof metadata");
        }
        let fields = normalize_invoice(kind, &metadata)?;
        flags.extend(fields.flags.iter().cloned());
        invoice = Some(fields);
    } else {
        flags.extend(evaluate_photo(&metadata, &milestone, now)?);
    }

    if kind != milestone.proof_kind {
        flags.push(FLAG_PROOF_KIND_MISMATCH.to_string());
    }

    let assessment = if deps.advisor.is_enabled() {
        let context = build_context(kind, &milestone.label, milestone.amount, &metadata, &flags);
        deps.advisor.assess(&context).await
    } else {
        None
    };

    let auto_approve = kind == ProofKind::Photo
        && flags.is_empty()
        && milestone.validator != MANUAL_VALIDATOR
        && assessment
            .as_ref()
            .map_or(true, |a| a.risk_level != RiskLevel::Critical);

    let mut tx = deps.db_pool.begin().await?;

    let escrow = Escrow::lock(request.escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| escrow_not_found(request.escrow_id))?;
    if escrow.status.is_terminal() {
        return Err(AppError::invalid_escrow_state(format!(
            "escrow is {}",
            escrow.status.as_str()
        )));
    }

    let current = Milestone::current_open(escrow.id, &mut *tx)
        .await?
        .ok_or_else(|| AppError::conflict("NO_OPEN_MILESTONE", "escrow has no open milestone"))?;
    if current.id != milestone.id {
        return Err(AppError::validation(
            "SEQUENCE_ERROR",
            format!(
                "milestone {} is next; proof was for milestone {}",
                current.idx, milestone.idx
            ),
        ));
    }
    if current.status != MilestoneStatus::Waiting {
        return Err(AppError::conflict(
            "MILESTONE_NOT_WAITING",
            format!("milestone {} is {}", current.idx, current.status.as_str()),
        ));
    }

    let event = if auto_approve {
        MilestoneEvent::ProofAutoApproved
    } else {
        MilestoneEvent::ProofNeedsReview
    };
    let target = next_status(current.status, event).ok_or_else(|| {
        AppError::conflict("MILESTONE_NOT_WAITING", "milestone cannot accept a proof")
    })?;

    let new = NewProof::builder()
        .escrow_id(escrow.id)
        .milestone_id(current.id)
        .kind(kind)
        .storage_url(request.storage_url.trim())
        .content_hash(content_hash)
        .metadata(JsonValue::Object(metadata))
        .rule_flags(flags.clone())
        .status(if auto_approve {
            ProofStatus::Approved
        } else {
            ProofStatus::Pending
        })
        .invoice_total(invoice.as_ref().and_then(|i| i.total))
        .invoice_currency(invoice.as_ref().and_then(|i| i.currency.clone()))
        .ai_checked_at(assessment.as_ref().map(|_| now))
        .assessment(assessment)
        .build();

    let proof = Proof::create(&new, &mut *tx).await?.ok_or_else(|| {
        AppError::conflict("PROOF_DUPLICATE", "a proof with this content hash already exists")
    })?;

    let milestone = Milestone::transition(current.id, current.status, target, &mut *tx)
        .await?
        .ok_or_else(|| AppError::conflict("MILESTONE_NOT_WAITING", "milestone changed concurrently"))?;

    EscrowEventRow::append(
        escrow.id,
        EscrowEventKind::ProofUploaded,
        &json!({
            "proof_id": proof.id,
            "milestone_idx": milestone.idx,
            "kind": kind,
            "status": proof.status,
        }),
        None,
        &mut *tx,
    )
    .await?;
    audit::record(
        &mut *tx,
        &actor,
        "PROOF_SUBMITTED",
        "proof",
        proof.id,
        json!({
            "escrow_id": escrow.id,
            "milestone_id": milestone.id,
            "kind": kind,
            "storage_url": proof.storage_url,
            "status": proof.status,
            "rule_flags": flags,
            "ai_risk_level": proof.ai_risk_level,
        }),
    )
    .await?;

    let payment = if auto_approve {
        Some(release_milestone(&mut *tx, deps, &escrow, &milestone, &actor).await?)
    } else {
        None
    };

    // Re-read after the payout so the response shows PAID / RELEASED.
    let milestone = Milestone::find_by_id(milestone.id, &mut *tx)
        .await?
        .unwrap_or(milestone);
    let escrow = Escrow::find_by_id(escrow.id, &mut *tx).await?.unwrap_or(escrow);

    tx.commit().await?;

    info!(
        proof_id = %proof.id,
        escrow_id = %escrow.id,
        milestone_idx = milestone.idx,
        auto_approved = auto_approve,
        "Proof submitted"
    );

    Ok(ProofOutcome {
        proof: proof.into(),
        milestone_status: milestone.status,
        escrow_status: escrow.status,
        payment: payment.map(Into::into),
    })
}
