//! Test fixtures for creating test data.
//!
//! Fixtures go through the public actions so audit rows and invariants are
//! the same as in production. Names are suffixed with a UUID so tests sharing
//! the database never collide.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

use escrow_core::common::{EscrowId, Money, Principal};
use escrow_core::domains::escrow::{self, CreateEscrowRequest, Escrow};
use escrow_core::domains::milestones::{self, CreateMilestoneRequest, Milestone};
use escrow_core::domains::proofs::SubmitProofRequest;
use escrow_core::domains::users::{self, CreateUserRequest, User};
use escrow_core::domains::webhooks::signature;
use escrow_core::domains::webhooks::WebhookDelivery;
use escrow_core::kernel::ServerDeps;

use super::harness::base_time;

/// Secret the default test deps verify webhooks with.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

pub fn admin() -> Principal {
    Principal::legacy()
}

pub fn money(raw: &str) -> Money {
    raw.parse().expect("valid money literal")
}

pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

pub async fn create_test_user(deps: &ServerDeps, prefix: &str) -> User {
    let username = unique(prefix);
    users::actions::create_user(
        CreateUserRequest {
            email: format!("{}@example.org", username),
            username,
            public_role: None,
            payout_account: Some("FR7630006000011234567890189".to_string()),
        },
        &admin(),
        deps,
    )
    .await
    .expect("create user")
}

/// DRAFT escrow between two fresh users, due 30 days after [`base_time`].
pub async fn create_test_escrow(deps: &ServerDeps, total: &str) -> Escrow {
    create_test_escrow_due(deps, total, base_time() + Duration::days(30)).await
}

pub async fn create_test_escrow_due(
    deps: &ServerDeps,
    total: &str,
    deadline_at: DateTime<Utc>,
) -> Escrow {
    let client = create_test_user(deps, "client").await;
    let provider = create_test_user(deps, "provider").await;
    escrow::actions::create_escrow(
        CreateEscrowRequest {
            client_id: client.id,
            provider_id: provider.id,
            amount_total: money(total),
            currency: "EUR".to_string(),
            release_conditions: None,
            deadline_at,
            domain: None,
        },
        &admin(),
        deps,
    )
    .await
    .expect("create escrow")
}

/// Deposit `amount` under a fresh idempotency key.
pub async fn fund(deps: &ServerDeps, escrow_id: EscrowId, amount: &str) -> Escrow {
    let key = unique("dep");
    escrow::actions::deposit(escrow_id, money(amount), Some(&key), &admin(), deps)
        .await
        .expect("deposit")
        .escrow
}

pub fn milestone_request(idx: i32, amount: &str, proof_kind: &str) -> CreateMilestoneRequest {
    serde_json::from_value(json!({
        "idx": idx,
        "label": format!("Tranche {}", idx),
        "amount": amount,
        "proof_kind": proof_kind,
    }))
    .expect("milestone request")
}

pub async fn add_milestone(
    deps: &ServerDeps,
    escrow_id: EscrowId,
    request: CreateMilestoneRequest,
) -> Milestone {
    milestones::actions::create_milestone(escrow_id, request, &admin(), deps)
        .await
        .expect("create milestone")
}

/// Metadata a trusted camera would send for a photo taken now.
pub fn camera_metadata(now: DateTime<Utc>, gps: Option<(f64, f64)>) -> Map<String, JsonValue> {
    let mut metadata = Map::new();
    metadata.insert("exif_timestamp".to_string(), json!(now.to_rfc3339()));
    metadata.insert("source".to_string(), json!("camera"));
    if let Some((lat, lng)) = gps {
        metadata.insert("gps_lat".to_string(), json!(lat));
        metadata.insert("gps_lng".to_string(), json!(lng));
    }
    metadata
}

/// Photo proof with a random content hash.
pub fn photo_proof(
    escrow_id: EscrowId,
    milestone_idx: i32,
    metadata: Map<String, JsonValue>,
) -> SubmitProofRequest {
    SubmitProofRequest {
        escrow_id,
        milestone_idx,
        kind: "PHOTO".to_string(),
        storage_url: format!("https://files.example.org/proofs/{}.jpg", Uuid::new_v4()),
        sha256: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
        metadata: Some(metadata),
    }
}

/// Webhook delivery signed with [`TEST_WEBHOOK_SECRET`] at `now`.
pub fn signed_webhook(body: JsonValue, now: DateTime<Utc>) -> WebhookDelivery {
    let body = serde_json::to_vec(&body).expect("webhook body");
    let timestamp = now.timestamp().to_string();
    let mac = signature::sign(TEST_WEBHOOK_SECRET, &timestamp, &body).expect("hmac key");
    WebhookDelivery {
        body,
        signature: Some(format!("sha256={}", hex::encode(mac))),
        timestamp: Some(timestamp),
        event_id: None,
        psp_ref: None,
        provider: None,
    }
}
