//! Integration tests for proof intake: photo rules, milestone ordering,
//! reviewer decisions and the payouts they trigger.

mod common;

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use test_context::test_context;

use crate::common::{
    add_milestone, admin, base_time, camera_metadata, create_test_escrow, fund, milestone_request,
    photo_proof, TestHarness,
};
use escrow_core::domains::escrow::actions::view;
use escrow_core::domains::escrow::EscrowStatus;
use escrow_core::domains::milestones::MilestoneStatus;
use escrow_core::domains::payments::PaymentStatus;
use escrow_core::domains::proofs::actions::{decide_proof, submit_proof};
use escrow_core::domains::proofs::{Proof, ProofDecisionRequest, ProofStatus};
use escrow_core::kernel::ai::StubProofAdvisor;
use escrow_core::kernel::{RiskLevel, TestDependencies};

const SITE: (f64, f64) = (48.8566, 2.3522);

fn decision(decision: &str, note: Option<&str>) -> ProofDecisionRequest {
    ProofDecisionRequest {
        decision: decision.to_string(),
        note: note.map(str::to_string),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn clean_photo_is_auto_approved_and_paid(ctx: &TestHarness) {
    let test_deps = TestDependencies::new(base_time());
    let psp = test_deps.psp.clone();
    let deps = ctx.deps_with(test_deps);

    let escrow = create_test_escrow(&deps, "100.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "100.00", "PHOTO")).await;
    fund(&deps, escrow.id, "100.00").await;

    let outcome = submit_proof(
        photo_proof(escrow.id, 1, camera_metadata(base_time(), None)),
        &admin(),
        &deps,
    )
    .await
    .unwrap();

    assert_eq!(outcome.proof.status, ProofStatus::Approved);
    assert_eq!(outcome.milestone_status, MilestoneStatus::Paid);
    assert_eq!(outcome.escrow_status, EscrowStatus::Released);

    let payment = outcome.payment.expect("auto-approval pays out");
    assert_eq!(payment.status, PaymentStatus::Sent);
    assert!(payment.psp_ref.is_some());
    assert_eq!(psp.payout_count(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn proof_for_a_later_milestone_is_out_of_sequence(ctx: &TestHarness) {
    let deps = ctx.deps();
    let escrow = create_test_escrow(&deps, "100.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "50.00", "PHOTO")).await;
    add_milestone(&deps, escrow.id, milestone_request(2, "50.00", "PHOTO")).await;
    fund(&deps, escrow.id, "100.00").await;

    let err = submit_proof(
        photo_proof(escrow.id, 2, camera_metadata(base_time(), None)),
        &admin(),
        &deps,
    )
    .await
    .unwrap_err();

    assert!(err.is_code("SEQUENCE_ERROR"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn photo_outside_geofence_is_rejected(ctx: &TestHarness) {
    let deps = ctx.deps();
    let escrow = create_test_escrow(&deps, "100.00").await;
    let mut request = milestone_request(1, "100.00", "PHOTO");
    request.geofence = serde_json::from_value(json!({
        "lat": SITE.0,
        "lng": SITE.1,
        "radius_m": 200.0
    }))
    .unwrap();
    add_milestone(&deps, escrow.id, request).await;
    fund(&deps, escrow.id, "100.00").await;

    // Roughly 380 m north of the site
    let far = camera_metadata(base_time(), Some((48.8600, 2.3522)));
    let err = submit_proof(photo_proof(escrow.id, 1, far), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("GEOFENCE_VIOLATION"), "got {}", err.code());

    let no_gps = camera_metadata(base_time(), None);
    let err = submit_proof(photo_proof(escrow.id, 1, no_gps), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("MISSING_GPS"), "got {}", err.code());

    let near = camera_metadata(base_time(), Some((48.8570, 2.3522)));
    let outcome = submit_proof(photo_proof(escrow.id, 1, near), &admin(), &deps)
        .await
        .unwrap();
    assert_eq!(outcome.milestone_status, MilestoneStatus::Paid);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_exif_timestamp_is_rejected(ctx: &TestHarness) {
    let deps = ctx.deps();
    let escrow = create_test_escrow(&deps, "100.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "100.00", "PHOTO")).await;
    fund(&deps, escrow.id, "100.00").await;

    let stale = camera_metadata(base_time() - Duration::hours(3), None);
    let err = submit_proof(photo_proof(escrow.id, 1, stale), &admin(), &deps)
        .await
        .unwrap_err();

    assert!(err.is_code("TIME_SKEW_OR_MISSING_EXIF"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn flagged_photo_waits_for_a_reviewer(ctx: &TestHarness) {
    let deps = ctx.deps();
    let escrow = create_test_escrow(&deps, "100.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "100.00", "PHOTO")).await;
    fund(&deps, escrow.id, "100.00").await;

    let mut metadata = camera_metadata(base_time(), None);
    metadata.insert("source".to_string(), json!("gallery"));
    let submitted = submit_proof(photo_proof(escrow.id, 1, metadata), &admin(), &deps)
        .await
        .unwrap();

    assert_eq!(submitted.proof.status, ProofStatus::Pending);
    assert_eq!(submitted.milestone_status, MilestoneStatus::PendingReview);
    assert_eq!(submitted.proof.rule_flags, json!(["UNTRUSTED_SOURCE"]));
    assert!(submitted.payment.is_none());

    let decided = decide_proof(
        submitted.proof.id,
        decision("approve", None),
        &admin(),
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(decided.proof.status, ProofStatus::Approved);
    assert_eq!(decided.milestone_status, MilestoneStatus::Paid);
    assert_eq!(decided.escrow_status, EscrowStatus::Released);

    let err = decide_proof(submitted.proof.id, decision("reject", None), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("PROOF_ALREADY_DECIDED"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn critical_advisor_verdict_needs_a_review_note(ctx: &TestHarness) {
    let test_deps = TestDependencies::new(base_time())
        .with_advisor(Arc::new(StubProofAdvisor::new("stub-advisor-v1")));
    let deps = ctx.deps_with(test_deps);

    let escrow = create_test_escrow(&deps, "100.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "100.00", "PHOTO")).await;
    fund(&deps, escrow.id, "100.00").await;

    let mut metadata = camera_metadata(base_time(), None);
    metadata.insert("software".to_string(), json!("Adobe Photoshop 25.0"));
    let submitted = submit_proof(photo_proof(escrow.id, 1, metadata), &admin(), &deps)
        .await
        .unwrap();

    assert_eq!(submitted.proof.status, ProofStatus::Pending);
    assert_eq!(submitted.proof.ai.risk_level, Some(RiskLevel::Critical));

    let err = decide_proof(submitted.proof.id, decision("approve", None), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("AI_REVIEW_NOTE_REQUIRED"));

    let decided = decide_proof(
        submitted.proof.id,
        decision("approve", Some("checked the original on site")),
        &admin(),
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(decided.proof.review_note.as_deref(), Some("checked the original on site"));
    assert_eq!(decided.milestone_status, MilestoneStatus::Paid);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn rejected_proof_pays_nothing(ctx: &TestHarness) {
    let test_deps = TestDependencies::new(base_time());
    let psp = test_deps.psp.clone();
    let deps = ctx.deps_with(test_deps);

    let escrow = create_test_escrow(&deps, "100.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "100.00", "PHOTO")).await;
    fund(&deps, escrow.id, "100.00").await;

    let mut metadata = camera_metadata(base_time(), None);
    metadata.remove("source");
    let submitted = submit_proof(photo_proof(escrow.id, 1, metadata), &admin(), &deps)
        .await
        .unwrap();
    assert_eq!(submitted.proof.rule_flags, json!(["MISSING_METADATA"]));

    let decided = decide_proof(
        submitted.proof.id,
        decision("reject", Some("blurry")),
        &admin(),
        &deps,
    )
    .await
    .unwrap();

    assert_eq!(decided.proof.status, ProofStatus::Rejected);
    assert_eq!(decided.milestone_status, MilestoneStatus::Rejected);
    assert_eq!(decided.escrow_status, EscrowStatus::Funded);
    assert!(decided.payment.is_none());
    assert_eq!(psp.payout_count(), 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reused_content_hash_is_a_duplicate(ctx: &TestHarness) {
    let test_deps = TestDependencies::new(base_time());
    let psp = test_deps.psp.clone();
    let deps = ctx.deps_with(test_deps);

    let escrow = create_test_escrow(&deps, "100.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "50.00", "PHOTO")).await;
    let second = add_milestone(&deps, escrow.id, milestone_request(2, "50.00", "PHOTO")).await;
    fund(&deps, escrow.id, "100.00").await;

    let first = photo_proof(escrow.id, 1, camera_metadata(base_time(), None));
    let reused_hash = first.sha256.clone();
    let paid = submit_proof(first, &admin(), &deps).await.unwrap();
    assert_eq!(paid.milestone_status, MilestoneStatus::Paid);

    let mut copy = photo_proof(escrow.id, 2, camera_metadata(base_time(), None));
    copy.sha256 = reused_hash;
    let err = submit_proof(copy, &admin(), &deps).await.unwrap_err();
    assert!(err.is_code("PROOF_DUPLICATE"), "got {}", err.code());

    // Nothing moved for the second milestone
    let snapshot = view(escrow.id, &deps).await.unwrap();
    assert_eq!(snapshot.escrow.status, EscrowStatus::Funded);
    assert_eq!(snapshot.milestones[1].status, MilestoneStatus::Waiting);
    assert_eq!(snapshot.payments.len(), 1);
    assert_eq!(psp.payout_count(), 1);

    let mut conn = ctx.db_pool.acquire().await.unwrap();
    let proofs = Proof::list_for_milestone(second.id, &mut conn).await.unwrap();
    assert!(proofs.is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn second_proof_while_under_review_is_refused(ctx: &TestHarness) {
    let deps = ctx.deps();
    let escrow = create_test_escrow(&deps, "100.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "100.00", "PHOTO")).await;
    fund(&deps, escrow.id, "100.00").await;

    let mut metadata = camera_metadata(base_time(), None);
    metadata.insert("source".to_string(), json!("gallery"));
    let submitted = submit_proof(photo_proof(escrow.id, 1, metadata), &admin(), &deps)
        .await
        .unwrap();
    assert_eq!(submitted.milestone_status, MilestoneStatus::PendingReview);

    let err = submit_proof(
        photo_proof(escrow.id, 1, camera_metadata(base_time(), None)),
        &admin(),
        &deps,
    )
    .await
    .unwrap_err();
    assert!(err.is_code("MILESTONE_NOT_WAITING"), "got {}", err.code());

    let snapshot = view(escrow.id, &deps).await.unwrap();
    assert_eq!(snapshot.milestones[0].status, MilestoneStatus::PendingReview);
    assert!(snapshot.payments.is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn proof_after_every_milestone_is_closed_has_nowhere_to_go(ctx: &TestHarness) {
    let deps = ctx.deps();
    let escrow = create_test_escrow(&deps, "100.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "60.00", "PHOTO")).await;
    add_milestone(&deps, escrow.id, milestone_request(2, "40.00", "PHOTO")).await;
    fund(&deps, escrow.id, "100.00").await;

    // First milestone paid, second rejected
    let paid = submit_proof(
        photo_proof(escrow.id, 1, camera_metadata(base_time(), None)),
        &admin(),
        &deps,
    )
    .await
    .unwrap();
    assert_eq!(paid.milestone_status, MilestoneStatus::Paid);

    let mut metadata = camera_metadata(base_time(), None);
    metadata.remove("source");
    let flagged = submit_proof(photo_proof(escrow.id, 2, metadata), &admin(), &deps)
        .await
        .unwrap();
    let rejected = decide_proof(flagged.proof.id, decision("reject", None), &admin(), &deps)
        .await
        .unwrap();
    assert_eq!(rejected.milestone_status, MilestoneStatus::Rejected);
    assert_eq!(rejected.escrow_status, EscrowStatus::Funded);

    let err = submit_proof(
        photo_proof(escrow.id, 2, camera_metadata(base_time(), None)),
        &admin(),
        &deps,
    )
    .await
    .unwrap_err();
    assert!(err.is_code("NO_OPEN_MILESTONE"), "got {}", err.code());
}
