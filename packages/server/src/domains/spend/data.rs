use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::AllowedPayee;
use crate::common::{AppError, AppResult, EscrowId, Money, PayeeId};
use crate::domains::payments::data::PaymentData;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayeeRequest {
    pub escrow_id: EscrowId,
    pub payee_ref: String,
    pub label: String,
    #[serde(default)]
    pub daily_limit: Option<Money>,
    #[serde(default)]
    pub total_limit: Option<Money>,
}

impl RegisterPayeeRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.payee_ref.trim().is_empty() || self.label.trim().is_empty() {
            return Err(AppError::bad_request(
                "INVALID_PAYLOAD",
                "payee_ref and label are required",
            ));
        }
        for limit in [self.daily_limit, self.total_limit].into_iter().flatten() {
            if !limit.is_positive() {
                return Err(AppError::invalid_amount("limits must be positive"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendRequest {
    pub escrow_id: EscrowId,
    pub payee_ref: String,
    pub amount: Money,
    #[serde(default)]
    pub note: Option<String>,
}

impl SpendRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.payee_ref.trim().is_empty() {
            return Err(AppError::bad_request("INVALID_PAYLOAD", "payee_ref is required"));
        }
        if !self.amount.is_positive() {
            return Err(AppError::invalid_amount("amount must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedPayeeData {
    pub id: PayeeId,
    pub escrow_id: EscrowId,
    pub payee_ref: String,
    pub label: String,
    pub daily_limit: Option<Money>,
    pub total_limit: Option<Money>,
    pub spent_today: Money,
    pub spent_total: Money,
    pub last_reset_date: NaiveDate,
}

impl From<AllowedPayee> for AllowedPayeeData {
    fn from(p: AllowedPayee) -> Self {
        Self {
            id: p.id,
            escrow_id: p.escrow_id,
            payee_ref: p.payee_ref,
            label: p.label,
            daily_limit: p.daily_limit,
            total_limit: p.total_limit,
            spent_today: p.spent_today,
            spent_total: p.spent_total,
            last_reset_date: p.last_reset_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendData {
    pub payment: PaymentData,
    pub payee: AllowedPayeeData,
}
