use anyhow::Context;
use serde_json::json;
use tracing::info;

use crate::common::utils::fingerprint::request_fingerprint;
use crate::common::{AppError, AppResult, Principal};
use crate::domains::audit;
use crate::domains::idempotency::{self, Claim};
use crate::domains::transactions::data::{CreateTransactionRequest, TransactionData};
use crate::domains::transactions::models::Transaction;
use crate::domains::users::User;
use crate::kernel::ServerDeps;

const SCOPE: &str = "transactions";

/// Record a transfer exactly once per idempotency key.
pub async fn create_transaction(
    request: CreateTransactionRequest,
    idempotency_key: Option<&str>,
    principal: &Principal,
    deps: &ServerDeps,
) -> AppResult<TransactionData> {
    let key = idempotency::require_key(idempotency_key)?;
    let currency = request.validate()?;
    let fingerprint = request_fingerprint(&request);

    let mut tx = deps.db_pool.begin().await?;

    let claim = idempotency::claim(
        &mut *tx,
        SCOPE,
        &key,
        &fingerprint,
        deps.config.idempotency_mismatch_policy,
    )
    .await?;
    if let Claim::Replay(stored) = claim {
        let replay: TransactionData =
            serde_json::from_value(stored).context("stored transaction response is unreadable")?;
        return Ok(replay);
    }

    for user_id in [request.sender_id, request.receiver_id] {
        if !User::exists(user_id, &mut *tx).await? {
            return Err(AppError::not_found(
                "USER_NOT_FOUND",
                format!("user {} not found", user_id),
            ));
        }
    }

    let transaction = Transaction::create(
        request.sender_id,
        request.receiver_id,
        request.amount,
        currency,
        &key,
        &mut *tx,
    )
    .await?;
    let data = TransactionData::from(transaction);

    audit::record(
        &mut *tx,
        &principal.actor(),
        "TRANSACTION_CREATED",
        "transaction",
        data.id,
        json!({
            "sender_id": data.sender_id,
            "receiver_id": data.receiver_id,
            "amount": data.amount,
            "currency": data.currency,
        }),
    )
    .await?;

    let response = serde_json::to_value(&data).context("serialize transaction")?;
    idempotency::complete(&mut *tx, SCOPE, &key, &response).await?;
    tx.commit().await?;

    info!(transaction_id = %data.id, amount = %data.amount, "Transaction recorded");
    Ok(data)
}
