//! Milestone state machine - pure decision logic
//!
//! ```text
//! WAITING        ── auto-approvable proof ──▶ APPROVED
//! WAITING        ── proof needs review    ──▶ PENDING_REVIEW
//! PENDING_REVIEW ── approve               ──▶ APPROVED
//! PENDING_REVIEW ── reject                ──▶ REJECTED
//! APPROVED       ── payout initiated      ──▶ PAYING
//! PAYING         ── payout sent           ──▶ PAID
//! ```

use super::models::MilestoneStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneEvent {
    ProofAutoApproved,
    ProofNeedsReview,
    ReviewApproved,
    ReviewRejected,
    PayoutInitiated,
    PayoutSent,
}

/// Next status for `event`, or `None` when the event is not valid from `from`.
pub fn next_status(from: MilestoneStatus, event: MilestoneEvent) -> Option<MilestoneStatus> {
    use MilestoneEvent::*;
    use MilestoneStatus::*;

    match (from, event) {
        (Waiting, ProofAutoApproved) => Some(Approved),
        (Waiting, ProofNeedsReview) => Some(PendingReview),
        (PendingReview, ReviewApproved) => Some(Approved),
        (PendingReview, ReviewRejected) => Some(Rejected),
        (Approved, PayoutInitiated) => Some(Paying),
        (Paying, PayoutSent) => Some(Paid),
        _ => None,
    }
}
