//! Integration tests for PSP webhook ingestion: signatures, replay
//! protection, settlement and funding.

mod common;

use chrono::Duration;
use serde_json::json;
use test_context::test_context;

use crate::common::{
    add_milestone, admin, base_time, camera_metadata, create_test_escrow, fund, milestone_request,
    money, photo_proof, signed_webhook, unique, TestHarness, TEST_WEBHOOK_SECRET,
};
use escrow_core::domains::audit::AuditLog;
use escrow_core::domains::escrow::actions::{create_funding_intent, view};
use escrow_core::domains::escrow::{Escrow, EscrowStatus};
use escrow_core::domains::milestones::MilestoneStatus;
use escrow_core::domains::payments::actions::execute_payment;
use escrow_core::domains::payments::{Payment, PaymentStatus};
use escrow_core::domains::proofs::actions::submit_proof;
use escrow_core::domains::webhooks::{ingest_webhook, PspWebhookEvent};
use escrow_core::kernel::test_dependencies::MockPspClient;
use escrow_core::kernel::{ServerDeps, TestDependencies, WebhookSecrets};

/// Escrow whose single milestone was paid out, with its SENT payment.
async fn sent_payout(deps: &ServerDeps) -> (Escrow, Payment) {
    let escrow = create_test_escrow(deps, "100.00").await;
    add_milestone(deps, escrow.id, milestone_request(1, "100.00", "PHOTO")).await;
    fund(deps, escrow.id, "100.00").await;
    let outcome = submit_proof(
        photo_proof(escrow.id, 1, camera_metadata(base_time(), None)),
        &admin(),
        deps,
    )
    .await
    .unwrap();
    let payment_id = outcome.payment.unwrap().id;

    let mut conn = deps.db_pool.acquire().await.unwrap();
    let payment = Payment::find_by_id(payment_id, &mut conn)
        .await
        .unwrap()
        .unwrap();
    (escrow, payment)
}

fn settled_event(psp_ref: &str) -> serde_json::Value {
    json!({
        "id": unique("evt"),
        "type": "payment.settled",
        "data": { "object": { "id": psp_ref } }
    })
}

#[test_context(TestHarness)]
#[tokio::test]
async fn settlement_webhook_settles_payment_once(ctx: &TestHarness) {
    let deps = ctx.deps();
    let (_, payment) = sent_payout(&deps).await;
    assert_eq!(payment.status, PaymentStatus::Sent);
    let psp_ref = payment.psp_ref.clone().unwrap();

    let body = settled_event(&psp_ref);
    let ack = ingest_webhook(signed_webhook(body.clone(), base_time()), &deps)
        .await
        .unwrap();
    assert!(ack.received);
    assert_eq!(ack.kind, "payment.settled");
    assert_eq!(ack.provider, "psp");

    let mut conn = ctx.db_pool.acquire().await.unwrap();
    let settled = Payment::find_by_id(payment.id, &mut conn)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, PaymentStatus::Settled);

    let event_id = body["id"].as_str().unwrap();
    let event = PspWebhookEvent::find("psp", event_id, &mut conn)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.processed_at, Some(base_time()));
    assert_eq!(event.psp_ref.as_deref(), Some(psp_ref.as_str()));

    let err = ingest_webhook(signed_webhook(body, base_time()), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("WEBHOOK_REPLAY"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failure_webhook_moves_pending_payment_to_error(ctx: &TestHarness) {
    let deps = ctx.deps_with(TestDependencies::new(base_time()).with_psp(MockPspClient::failing()));
    let escrow = create_test_escrow(&deps, "40.00").await;
    add_milestone(&deps, escrow.id, milestone_request(1, "40.00", "PHOTO")).await;
    fund(&deps, escrow.id, "40.00").await;
    let outcome = submit_proof(
        photo_proof(escrow.id, 1, camera_metadata(base_time(), None)),
        &admin(),
        &deps,
    )
    .await
    .unwrap();
    let pending_id = outcome.payment.unwrap().id;

    let mut conn = ctx.db_pool.acquire().await.unwrap();
    let pending = Payment::find_by_id(pending_id, &mut conn).await.unwrap().unwrap();
    assert_eq!(pending.status, PaymentStatus::Pending);
    assert!(pending.psp_ref.is_none());

    // No PSP reference yet, so the PSP names the payout by our key
    let body = json!({
        "event_id": unique("evt"),
        "event_type": "payment.failed",
        "data": { "object": { "metadata": { "payment_key": pending.idempotency_key.clone().unwrap() } } },
        "reason": "account closed"
    });
    ingest_webhook(signed_webhook(body, base_time()), &deps)
        .await
        .unwrap();

    let failed = Payment::find_by_id(pending_id, &mut conn).await.unwrap().unwrap();
    assert_eq!(failed.status, PaymentStatus::Error);

    let audit = AuditLog::find_for_entity("payment", &pending_id.to_string(), &mut conn)
        .await
        .unwrap();
    assert!(audit.iter().any(|e| e.action == "PAYMENT_FAILED"));

    // ERROR is terminal for the executor too
    let err = execute_payment(pending_id, &admin(), &deps).await.unwrap_err();
    assert!(err.is_code("INVALID_PAYMENT_STATE"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failure_webhook_keeps_sent_payment_sent(ctx: &TestHarness) {
    let deps = ctx.deps();
    let (escrow, payment) = sent_payout(&deps).await;

    let event_id = unique("evt");
    let body = json!({
        "event_id": event_id,
        "event_type": "payment.failed",
        "psp_ref": payment.psp_ref.clone().unwrap(),
        "reason": "late bounce"
    });
    ingest_webhook(signed_webhook(body, base_time()), &deps)
        .await
        .unwrap();

    let mut conn = ctx.db_pool.acquire().await.unwrap();
    let unchanged = Payment::find_by_id(payment.id, &mut conn).await.unwrap().unwrap();
    assert_eq!(unchanged.status, PaymentStatus::Sent);

    let snapshot = view(escrow.id, &deps).await.unwrap();
    assert_eq!(snapshot.escrow.status, EscrowStatus::Released);
    assert_eq!(snapshot.milestones[0].status, MilestoneStatus::Paid);

    let audit = AuditLog::find_for_entity("payment", &payment.id.to_string(), &mut conn)
        .await
        .unwrap();
    assert!(audit.iter().any(|e| e.action == "PAYMENT_FAILURE_IGNORED"));

    // Settlement still goes through afterwards
    ingest_webhook(signed_webhook(settled_event(&unchanged.psp_ref.unwrap()), base_time()), &deps)
        .await
        .unwrap();
    let settled = Payment::find_by_id(payment.id, &mut conn).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Settled);

    let event = PspWebhookEvent::find("psp", &event_id, &mut conn)
        .await
        .unwrap()
        .unwrap();
    assert!(event.processed_at.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn tampered_body_fails_signature_check(ctx: &TestHarness) {
    let deps = ctx.deps();
    let mut delivery = signed_webhook(settled_event("psp-unknown"), base_time());
    delivery.body = serde_json::to_vec(&settled_event("psp-other")).unwrap();

    let err = ingest_webhook(delivery, &deps).await.unwrap_err();
    assert!(err.is_code("WEBHOOK_SIGNATURE_INVALID"), "got {}", err.code());

    let mut unsigned = signed_webhook(settled_event("psp-unknown"), base_time());
    unsigned.signature = None;
    let err = ingest_webhook(unsigned, &deps).await.unwrap_err();
    assert!(err.is_code("WEBHOOK_SIGNATURE_INVALID"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_timestamp_is_rejected(ctx: &TestHarness) {
    let deps = ctx.deps();
    let signed_earlier = signed_webhook(settled_event("psp-x"), base_time() - Duration::minutes(10));

    let err = ingest_webhook(signed_earlier, &deps).await.unwrap_err();
    assert!(err.is_code("WEBHOOK_TIMESTAMP_OUT_OF_RANGE"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn missing_secret_is_unavailable(ctx: &TestHarness) {
    let deps = ctx.deps_with(
        TestDependencies::new(base_time()).with_secrets(WebhookSecrets::default()),
    );

    let err = ingest_webhook(signed_webhook(settled_event("psp-x"), base_time()), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("WEBHOOK_SECRET_MISSING"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn rotation_secret_is_accepted(ctx: &TestHarness) {
    let deps = ctx.deps_with(TestDependencies::new(base_time()).with_secrets(WebhookSecrets {
        primary: Some("whsec_new".to_string()),
        next: Some(TEST_WEBHOOK_SECRET.to_string()),
    }));

    // Unknown kinds are stored and acknowledged without touching payments
    let body = json!({ "id": unique("evt"), "type": "customer.updated" });
    let ack = ingest_webhook(signed_webhook(body, base_time()), &deps)
        .await
        .unwrap();
    assert_eq!(ack.kind, "customer.updated");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_payment_reference_is_not_acknowledged(ctx: &TestHarness) {
    let deps = ctx.deps();
    let body = settled_event(&unique("psp-missing"));

    let err = ingest_webhook(signed_webhook(body.clone(), base_time()), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("PAYMENT_NOT_FOUND"));

    // Nothing was committed, not even the event row
    let mut conn = ctx.db_pool.acquire().await.unwrap();
    let stored = PspWebhookEvent::find("psp", body["id"].as_str().unwrap(), &mut conn)
        .await
        .unwrap();
    assert!(stored.is_none());

    // So the PSP's retry is processed instead of being a replay
    let err = ingest_webhook(signed_webhook(body, base_time()), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("PAYMENT_NOT_FOUND"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn funding_webhook_deposits_the_intent_amount(ctx: &TestHarness) {
    let deps = ctx.deps();
    let escrow = create_test_escrow(&deps, "75.00").await;
    let intent = create_funding_intent(escrow.id, money("75.00"), &admin(), &deps)
        .await
        .unwrap();

    let body = json!({
        "id": unique("evt"),
        "type": "funding.succeeded",
        "data": { "object": { "id": intent.intent_id } }
    });
    ingest_webhook(signed_webhook(body, base_time()), &deps)
        .await
        .unwrap();

    let snapshot = view(escrow.id, &deps).await.unwrap();
    assert_eq!(snapshot.escrow.status, EscrowStatus::Funded);
    assert_eq!(snapshot.deposited, money("75.00"));

    // A second event for the same intent does not deposit twice
    let again = json!({
        "id": unique("evt"),
        "type": "funding.succeeded",
        "data": { "object": { "id": intent.intent_id } }
    });
    ingest_webhook(signed_webhook(again, base_time()), &deps)
        .await
        .unwrap();
    let snapshot = view(escrow.id, &deps).await.unwrap();
    assert_eq!(snapshot.deposited, money("75.00"));
}
