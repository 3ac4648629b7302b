//! Integration tests for payouts: PSP outages, resuming a PENDING payment and
//! the one-step-at-a-time execute operation.

mod common;

use test_context::test_context;

use crate::common::{
    add_milestone, admin, base_time, camera_metadata, create_test_escrow, fund, milestone_request,
    photo_proof, TestHarness,
};
use escrow_core::common::PaymentId;
use escrow_core::domains::audit::AuditLog;
use escrow_core::domains::escrow::actions::view;
use escrow_core::domains::escrow::EscrowStatus;
use escrow_core::domains::milestones::MilestoneStatus;
use escrow_core::domains::payments::actions::execute_payment;
use escrow_core::domains::payments::PaymentStatus;
use escrow_core::domains::proofs::actions::submit_proof;
use escrow_core::kernel::test_dependencies::MockPspClient;
use escrow_core::kernel::TestDependencies;

#[test_context(TestHarness)]
#[tokio::test]
async fn psp_outage_leaves_payment_pending_until_retried(ctx: &TestHarness) {
    let test_deps = TestDependencies::new(base_time()).with_psp(MockPspClient::failing());
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

    let pending = outcome.payment.expect("payment row is created");
    assert_eq!(pending.status, PaymentStatus::Pending);
    assert!(pending.psp_ref.is_none());
    assert_eq!(outcome.milestone_status, MilestoneStatus::Paying);
    assert_eq!(outcome.escrow_status, EscrowStatus::Funded);

    // Still down: execute changes nothing
    let still_pending = execute_payment(pending.id, &admin(), &deps).await.unwrap();
    assert_eq!(still_pending.status, PaymentStatus::Pending);

    psp.set_failing(false);

    let sent = execute_payment(pending.id, &admin(), &deps).await.unwrap();
    assert_eq!(sent.status, PaymentStatus::Sent);
    assert!(sent.psp_ref.is_some());
    assert_eq!(psp.payout_count(), 1);

    let snapshot = view(escrow.id, &deps).await.unwrap();
    assert_eq!(snapshot.escrow.status, EscrowStatus::Released);
    assert_eq!(snapshot.milestones[0].status, MilestoneStatus::Paid);
    assert_eq!(snapshot.payments.len(), 1);

    let settled = execute_payment(pending.id, &admin(), &deps).await.unwrap();
    assert_eq!(settled.status, PaymentStatus::Settled);

    let again = execute_payment(pending.id, &admin(), &deps).await.unwrap();
    assert_eq!(again.status, PaymentStatus::Settled);
    assert_eq!(psp.payout_count(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn payout_request_carries_the_payment_key(ctx: &TestHarness) {
    let test_deps = TestDependencies::new(base_time());
    let psp = test_deps.psp.clone();
    let deps = ctx.deps_with(test_deps);

    let escrow = create_test_escrow(&deps, "60.00").await;
    let milestone = add_milestone(&deps, escrow.id, milestone_request(1, "60.00", "PHOTO")).await;
    fund(&deps, escrow.id, "60.00").await;

    let outcome = submit_proof(
        photo_proof(escrow.id, 1, camera_metadata(base_time(), None)),
        &admin(),
        &deps,
    )
    .await
    .unwrap();
    let payment = outcome.payment.unwrap();

    let payouts = psp.payouts();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].payment_id, payment.id);
    assert_eq!(
        payouts[0].idempotency_key,
        format!("pay|escrow:{}|ms:{}|amt:60.00", escrow.id, milestone.id)
    );

    let mut conn = ctx.db_pool.acquire().await.unwrap();
    let audit = AuditLog::find_for_entity("payment", &payment.id.to_string(), &mut conn)
        .await
        .unwrap();
    let actions: Vec<&str> = audit.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["PAYMENT_CREATED", "PAYMENT_SENT"]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_payment_is_not_found(ctx: &TestHarness) {
    let deps = ctx.deps();
    let err = execute_payment(PaymentId::new(i64::MAX), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("PAYMENT_NOT_FOUND"));
}
