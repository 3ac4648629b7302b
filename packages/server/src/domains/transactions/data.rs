use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::Transaction;
use crate::common::{AppError, AppResult, Currency, Money, TransactionId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub amount: Money,
    pub currency: String,
}

impl CreateTransactionRequest {
    pub fn validate(&self) -> AppResult<Currency> {
        if !self.amount.is_positive() {
            return Err(AppError::invalid_amount("amount must be positive"));
        }
        if self.sender_id == self.receiver_id {
            return Err(AppError::bad_request(
                "INVALID_PAYLOAD",
                "sender and receiver must differ",
            ));
        }
        self.currency.parse().map_err(|_| {
            AppError::validation(
                "UNSUPPORTED_CURRENCY",
                format!("currency '{}' is not supported", self.currency),
            )
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionData {
    pub id: TransactionId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub amount: Money,
    pub currency: Currency,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionData {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            sender_id: t.sender_id,
            receiver_id: t.receiver_id,
            amount: t.amount,
            currency: t.currency,
            status: t.status,
            created_at: t.created_at,
        }
    }
}
