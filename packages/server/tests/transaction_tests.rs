//! Integration tests for operator-recorded direct transfers.

mod common;

use test_context::test_context;

use crate::common::{admin, create_test_user, money, unique, TestHarness};
use escrow_core::common::{Currency, UserId};
use escrow_core::domains::idempotency::{self, IdempotencyRecord};
use escrow_core::domains::transactions::actions::create_transaction;
use escrow_core::domains::transactions::CreateTransactionRequest;

fn transfer(sender_id: UserId, receiver_id: UserId, amount: &str) -> CreateTransactionRequest {
    CreateTransactionRequest {
        sender_id,
        receiver_id,
        amount: money(amount),
        currency: "usd".to_string(),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn transfer_is_recorded_once_per_key(ctx: &TestHarness) {
    let deps = ctx.deps();
    let sender = create_test_user(&deps, "sender").await;
    let receiver = create_test_user(&deps, "receiver").await;

    let key = unique("tx");
    let first = create_transaction(transfer(sender.id, receiver.id, "42.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap();
    assert_eq!(first.currency, Currency::Usd);
    assert_eq!(first.amount, money("42.00"));

    let replay = create_transaction(transfer(sender.id, receiver.id, "42.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap();
    assert_eq!(first.id, replay.id);

    // One record for the key, holding the first response
    let mut conn = ctx.db_pool.acquire().await.unwrap();
    assert_eq!(IdempotencyRecord::count("transactions", &key, &mut conn).await.unwrap(), 1);
    let stored = idempotency::get_existing(&mut conn, "transactions", &key)
        .await
        .unwrap()
        .expect("key was claimed");
    assert_eq!(
        stored.response.expect("response was stored")["id"],
        serde_json::to_value(first.id).unwrap()
    );
    assert!(idempotency::get_existing(&mut conn, "transactions", &unique("tx"))
        .await
        .unwrap()
        .is_none());

    let err = create_transaction(transfer(sender.id, receiver.id, "43.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("IDEMPOTENCY_KEY_CONFLICT"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn transfer_requires_known_distinct_users(ctx: &TestHarness) {
    let deps = ctx.deps();
    let sender = create_test_user(&deps, "sender").await;

    let key = unique("tx");
    let err = create_transaction(transfer(sender.id, sender.id, "5.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("INVALID_PAYLOAD"), "got {}", err.code());

    let key = unique("tx");
    let err = create_transaction(
        transfer(sender.id, UserId::new(i64::MAX), "5.00"),
        Some(&key),
        &admin(),
        &deps,
    )
    .await
    .unwrap_err();
    assert!(err.is_code("USER_NOT_FOUND"), "got {}", err.code());

    let err = create_transaction(transfer(sender.id, UserId::new(i64::MAX), "5.00"), None, &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("IDEMPOTENCY_KEY_REQUIRED"));
}
