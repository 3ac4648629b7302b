//! Integration tests for usage mandates and purchases charged against them.

mod common;

use chrono::Duration;
use test_context::test_context;
use tokio::task::JoinSet;

use crate::common::{admin, base_time, create_test_user, money, unique, TestHarness};
use escrow_core::domains::mandates::actions::{
    add_allowlist_entry, create_mandate, create_merchant, purchase,
};
use escrow_core::domains::mandates::{
    AllowlistRequest, CreateMandateRequest, CreateMerchantRequest, MandateStatus, Merchant,
    PurchaseRequest, UsageMandate,
};
use escrow_core::domains::users::User;
use escrow_core::kernel::ServerDeps;

struct Parties {
    sender: User,
    beneficiary: User,
}

async fn parties(deps: &ServerDeps) -> Parties {
    Parties {
        sender: create_test_user(deps, "sender").await,
        beneficiary: create_test_user(deps, "beneficiary").await,
    }
}

async fn merchant(deps: &ServerDeps, category: &str, is_certified: bool) -> Merchant {
    create_merchant(
        CreateMerchantRequest {
            name: unique("shop"),
            category: category.to_string(),
            is_certified,
        },
        &admin(),
        deps,
    )
    .await
    .unwrap()
}

fn mandate_request(p: &Parties, total: &str, category: Option<&str>) -> CreateMandateRequest {
    CreateMandateRequest {
        sender_id: p.sender.id,
        beneficiary_id: p.beneficiary.id,
        total_amount: money(total),
        currency: "EUR".to_string(),
        allowed_category: category.map(str::to_string),
        allowed_merchant_id: None,
        expires_at: base_time() + Duration::days(30),
    }
}

fn purchase_request(p: &Parties, merchant: &Merchant, amount: &str) -> PurchaseRequest {
    PurchaseRequest {
        sender_id: p.sender.id,
        beneficiary_id: Some(p.beneficiary.id),
        merchant_id: merchant.id,
        amount: money(amount),
        currency: "EUR".to_string(),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_purchases_never_overspend(ctx: &TestHarness) {
    let deps = ctx.deps();
    let p = parties(&deps).await;
    let shop = merchant(&deps, "groceries", true).await;
    let mandate = create_mandate(mandate_request(&p, "100.00", None), &admin(), &deps)
        .await
        .unwrap();

    let mut attempts = JoinSet::new();
    for _ in 0..5 {
        let deps = deps.clone();
        let request = purchase_request(&p, &shop, "30.00");
        attempts.spawn(async move {
            let key = unique("buy");
            purchase(request, Some(&key), &admin(), &deps).await
        });
    }
    let mut results = Vec::new();
    while let Some(joined) = attempts.join_next().await {
        results.push(joined.unwrap());
    }

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 3);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(err.is_code("MANDATE_CONFLICT"), "got {}", err.code());
    }

    let mut conn = ctx.db_pool.acquire().await.unwrap();
    let after = UsageMandate::find_by_id(mandate.id, &mut conn)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.total_spent, money("90.00"));
    assert_eq!(after.status, MandateStatus::Active);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn spending_the_full_amount_consumes_the_mandate(ctx: &TestHarness) {
    let deps = ctx.deps();
    let p = parties(&deps).await;
    let shop = merchant(&deps, "pharmacy", true).await;
    create_mandate(mandate_request(&p, "50.00", None), &admin(), &deps)
        .await
        .unwrap();

    let key = unique("buy");
    let data = purchase(purchase_request(&p, &shop, "50.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap();
    assert_eq!(data.mandate_remaining, money("0"));
    assert_eq!(data.mandate_status, MandateStatus::Consumed);

    let key = unique("buy");
    let err = purchase(purchase_request(&p, &shop, "1.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("MANDATE_REQUIRED"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn purchase_replay_returns_the_first_result(ctx: &TestHarness) {
    let deps = ctx.deps();
    let p = parties(&deps).await;
    let shop = merchant(&deps, "groceries", true).await;
    create_mandate(mandate_request(&p, "100.00", None), &admin(), &deps)
        .await
        .unwrap();

    let key = unique("buy");
    let first = purchase(purchase_request(&p, &shop, "20.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap();
    let second = purchase(purchase_request(&p, &shop, "20.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.mandate_remaining, money("80.00"));

    let err = purchase(purchase_request(&p, &shop, "25.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("IDEMPOTENCY_KEY_CONFLICT"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn only_one_active_mandate_per_triple(ctx: &TestHarness) {
    let deps = ctx.deps();
    let p = parties(&deps).await;
    create_mandate(mandate_request(&p, "100.00", None), &admin(), &deps)
        .await
        .unwrap();

    let err = create_mandate(mandate_request(&p, "40.00", None), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("MANDATE_ALREADY_ACTIVE"), "got {}", err.code());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn category_and_merchant_rules_apply(ctx: &TestHarness) {
    let deps = ctx.deps();
    let p = parties(&deps).await;
    let grocer = merchant(&deps, "Groceries", false).await;
    let bar = merchant(&deps, "alcohol", true).await;
    create_mandate(mandate_request(&p, "100.00", Some("GROCERIES")), &admin(), &deps)
        .await
        .unwrap();

    let key = unique("buy");
    let err = purchase(purchase_request(&p, &bar, "10.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("MANDATE_CATEGORY_FORBIDDEN"), "got {}", err.code());

    // Right category, but the merchant is neither certified nor allowlisted
    let key = unique("buy");
    let err = purchase(purchase_request(&p, &grocer, "10.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("UNAUTHORIZED_USAGE"), "got {}", err.code());

    add_allowlist_entry(
        AllowlistRequest {
            beneficiary_id: p.beneficiary.id,
            merchant_id: None,
            category: Some("groceries".to_string()),
        },
        &admin(),
        &deps,
    )
    .await
    .unwrap();

    let key = unique("buy");
    let data = purchase(purchase_request(&p, &grocer, "10.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap();
    assert_eq!(data.category, "groceries");
    assert_eq!(data.mandate_remaining, money("90.00"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn purchase_without_mandate_is_forbidden(ctx: &TestHarness) {
    let deps = ctx.deps();
    let p = parties(&deps).await;
    let shop = merchant(&deps, "groceries", true).await;

    let err = purchase(purchase_request(&p, &shop, "5.00"), None, &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("IDEMPOTENCY_KEY_REQUIRED"));

    let key = unique("buy");
    let err = purchase(purchase_request(&p, &shop, "5.00"), Some(&key), &admin(), &deps)
        .await
        .unwrap_err();
    assert!(err.is_code("MANDATE_REQUIRED"), "got {}", err.code());
}
