use serde_json::json;
use tracing::info;

use crate::common::{AppError, AppResult, EscrowId, Principal};
use crate::domains::audit;
use crate::domains::escrow::models::Escrow;
use crate::domains::milestones::data::CreateMilestoneRequest;
use crate::domains::milestones::models::{Milestone, NewMilestone};
use crate::kernel::ServerDeps;

/// Attach a milestone to a non-terminal escrow.
///
/// The sum of all milestone amounts may not exceed the escrow total.
pub async fn create_milestone(
    escrow_id: EscrowId,
    request: CreateMilestoneRequest,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<Milestone> {
    let (proof_kind, geofence) = request.validate()?;

    let mut tx = deps.db_pool.begin().await?;

    let escrow = Escrow::lock(escrow_id, &mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("ESCROW_NOT_FOUND", "escrow not found"))?;
    if escrow.status.is_terminal() {
        return Err(AppError::invalid_escrow_state(format!(
            "cannot add milestones to a {} escrow",
            escrow.status.as_str()
        )));
    }

    let allocated = Milestone::sum_amounts(escrow_id, &mut *tx).await?;
    let would_allocate = allocated
        .checked_add(request.amount)
        .ok_or_else(|| AppError::invalid_amount("milestone amount overflows"))?;
    if would_allocate > escrow.amount_total {
        return Err(AppError::validation(
            "MILESTONE_TOTAL_EXCEEDED",
            format!(
                "milestones would total {} but the escrow holds {}",
                would_allocate, escrow.amount_total
            ),
        ));
    }

    let new = NewMilestone::builder()
        .escrow_id(escrow_id)
        .idx(request.idx)
        .label(request.label.trim())
        .amount(request.amount)
        .proof_kind(proof_kind)
        .validator(request.validator.trim())
        .geofence(geofence)
        .proof_requirements(request.proof_requirements)
        .build();

    let milestone = Milestone::create(&new, &mut *tx).await?.ok_or_else(|| {
        AppError::conflict(
            "MILESTONE_INDEX_TAKEN",
            format!("milestone {} already exists for this escrow", request.idx),
        )
    })?;

    audit::record(
        &mut *tx,
        &principal.actor(),
        "MILESTONE_CREATED",
        "milestone",
        milestone.id,
        json!({
            "escrow_id": escrow_id,
            "idx": milestone.idx,
            "amount": milestone.amount,
            "proof_kind": milestone.proof_kind,
        }),
    )
    .await?;

    tx.commit().await?;

    info!(escrow_id = %escrow_id, milestone_id = %milestone.id, idx = milestone.idx, "Milestone created");
    Ok(milestone)
}
