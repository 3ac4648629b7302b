use serde_json::json;
use tracing::{info, instrument};

use super::release::release_milestone;
use crate::common::{AppError, AppResult, Principal, ProofId};
use crate::domains::audit;
use crate::domains::escrow::actions::escrow_not_found;
use crate::domains::escrow::models::Escrow;
use crate::domains::milestones::machines::{next_status, MilestoneEvent};
use crate::domains::milestones::models::{Milestone, MilestoneStatus};
use crate::domains::proofs::data::{Decision, ProofDecisionRequest, ProofOutcome};
use crate::domains::proofs::models::{Proof, ProofStatus};
use crate::kernel::ServerDeps;

/// Reviewer decision on a PENDING proof.
///
/// Proofs the advisor marked `warning` or `critical` need a note.
#[instrument(skip(request, principal, deps), fields(proof_id = %proof_id))]
pub async fn decide_proof(
    proof_id: ProofId,
    request: ProofDecisionRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<ProofOutcome> {
    let decision = request.decision()?;
    let note = request.note();
    let actor = principal.actor();

    let mut tx = deps.db_pool.begin().await?;

    let proof = Proof::find_by_id(proof_id, &mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("PROOF_NOT_FOUND", format!("proof {} not found", proof_id)))?;
    let escrow = Escrow::lock(proof.escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| escrow_not_found(proof.escrow_id))?;
    let proof = Proof::lock_by_id(proof_id, &mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("PROOF_NOT_FOUND", format!("proof {} not found", proof_id)))?;

    if proof.status != ProofStatus::Pending {
        return Err(AppError::conflict(
            "PROOF_ALREADY_DECIDED",
            format!("proof {} was already decided", proof.id),
        ));
    }

    let milestone = Milestone::find_by_id(proof.milestone_id, &mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("MILESTONE_NOT_FOUND", "milestone not found"))?;
    if milestone.status != MilestoneStatus::PendingReview {
        return Err(AppError::conflict(
            "MILESTONE_NOT_PENDING_REVIEW",
            format!("milestone {} is {}", milestone.idx, milestone.status.as_str()),
        ));
    }

    let needs_note = proof
        .ai_risk_level
        .map_or(false, |level| level.requires_review_note());
    if needs_note && note.is_none() {
        return Err(AppError::validation(
            "AI_REVIEW_NOTE_REQUIRED",
            "a review note is required when the advisor flagged this proof",
        ));
    }

    let (proof_status, event, action) = match decision {
        Decision::Approve => {
            if escrow.status.is_terminal() {
                return Err(AppError::invalid_escrow_state(format!(
                    "escrow is {}",
                    escrow.status.as_str()
                )));
            }
            (ProofStatus::Approved, MilestoneEvent::ReviewApproved, "PROOF_APPROVED")
        }
        Decision::Reject => (ProofStatus::Rejected, MilestoneEvent::ReviewRejected, "PROOF_REJECTED"),
    };
    let target = next_status(milestone.status, event).ok_or_else(|| {
        AppError::conflict("MILESTONE_NOT_PENDING_REVIEW", "milestone cannot take this decision")
    })?;

    let proof = Proof::decide(proof.id, proof_status, &actor, note, deps.clock.now(), &mut *tx)
        .await?
        .ok_or_else(|| AppError::conflict("PROOF_ALREADY_DECIDED", "proof was decided concurrently"))?;
    let milestone = Milestone::transition(milestone.id, milestone.status, target, &mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::conflict("MILESTONE_NOT_PENDING_REVIEW", "milestone changed concurrently")
        })?;

    audit::record(
        &mut *tx,
        &actor,
        action,
        "proof",
        proof.id,
        json!({
            "escrow_id": escrow.id,
            "milestone_id": milestone.id,
            "note": note,
            "ai_risk_level": proof.ai_risk_level,
        }),
    )
    .await?;

    let payment = match decision {
        Decision::Approve => Some(release_milestone(&mut *tx, deps, &escrow, &milestone, &actor).await?),
        Decision::Reject => None,
    };

    let milestone = Milestone::find_by_id(milestone.id, &mut *tx)
        .await?
        .unwrap_or(milestone);
    let escrow = Escrow::find_by_id(escrow.id, &mut *tx).await?.unwrap_or(escrow);

    tx.commit().await?;

    info!(proof_id = %proof.id, decision = ?decision, milestone_status = milestone.status.as_str(), "Proof decided");

    Ok(ProofOutcome {
        proof: proof.into(),
        milestone_status: milestone.status,
        escrow_status: escrow.status,
        payment: payment.map(Into::into),
    })
}
