use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::models::{Escrow, EscrowDeposit, EscrowDomain, EscrowStatus, FundingIntent, FundingStatus};
use crate::common::{
    AppError, AppResult, Currency, DepositId, EscrowId, FundingIntentId, Money, UserId,
};
use crate::domains::milestones::MilestoneData;
use crate::domains::payments::PaymentData;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEscrowRequest {
    pub client_id: UserId,
    pub provider_id: UserId,
    pub amount_total: Money,
    pub currency: String,
    #[serde(default)]
    pub release_conditions: Option<JsonValue>,
    pub deadline_at: DateTime<Utc>,
    #[serde(default)]
    pub domain: Option<EscrowDomain>,
}

impl CreateEscrowRequest {
    /// Returns the parsed currency.
    pub fn validate(&self) -> AppResult<Currency> {
        if !self.amount_total.is_positive() {
            return Err(AppError::invalid_amount("amount_total must be positive"));
        }
        let currency: Currency = self.currency.parse().map_err(|_| {
            AppError::validation(
                "UNSUPPORTED_CURRENCY",
                format!("currency '{}' is not supported", self.currency),
            )
        })?;
        if let Some(conditions) = &self.release_conditions {
            if !conditions.is_object() {
                return Err(AppError::bad_request(
                    "INVALID_PAYLOAD",
                    "release_conditions must be an object",
                ));
            }
        }
        Ok(currency)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: Money,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryRequest {
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub proof_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingIntentRequest {
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowData {
    pub id: EscrowId,
    pub client_id: UserId,
    pub provider_id: UserId,
    pub amount_total: Money,
    pub currency: Currency,
    pub domain: EscrowDomain,
    pub release_conditions: JsonValue,
    pub deadline_at: DateTime<Utc>,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Escrow> for EscrowData {
    fn from(e: Escrow) -> Self {
        Self {
            id: e.id,
            client_id: e.client_id,
            provider_id: e.provider_id,
            amount_total: e.amount_total,
            currency: e.currency,
            domain: e.domain,
            release_conditions: e.release_conditions,
            deadline_at: e.deadline_at,
            status: e.status,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositData {
    pub escrow: EscrowData,
    pub deposit_id: DepositId,
    pub amount: Money,
    /// True when the idempotency key had already been used
    pub replayed: bool,
}

impl DepositData {
    pub fn new(escrow: Escrow, deposit: EscrowDeposit, replayed: bool) -> Self {
        Self {
            escrow: escrow.into(),
            deposit_id: deposit.id,
            amount: deposit.amount,
            replayed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingIntentData {
    pub id: FundingIntentId,
    pub escrow_id: EscrowId,
    pub intent_id: String,
    pub amount: Money,
    pub status: FundingStatus,
    pub created_at: DateTime<Utc>,
}

impl From<FundingIntent> for FundingIntentData {
    fn from(f: FundingIntent) -> Self {
        Self {
            id: f.id,
            escrow_id: f.escrow_id,
            intent_id: f.intent_id,
            amount: f.amount,
            status: f.status,
            created_at: f.created_at,
        }
    }
}

/// Escrow with its balances, milestones and payouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowView {
    pub escrow: EscrowData,
    pub deposited: Money,
    pub paid_out: Money,
    pub reserved: Money,
    pub available: Money,
    pub milestones: Vec<MilestoneData>,
    pub payments: Vec<PaymentData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(amount: &str, currency: &str) -> CreateEscrowRequest {
        serde_json::from_value(json!({
            "client_id": 1,
            "provider_id": 2,
            "amount_total": amount,
            "currency": currency,
            "deadline_at": "2030-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_validate_currency_and_amount() {
        assert_eq!(request("100.00", "usd").validate().unwrap(), Currency::Usd);
        assert!(request("0", "USD")
            .validate()
            .unwrap_err()
            .is_code("INVALID_AMOUNT"));
        assert!(request("10", "GBP")
            .validate()
            .unwrap_err()
            .is_code("UNSUPPORTED_CURRENCY"));
    }

    #[test]
    fn test_release_conditions_must_be_object() {
        let mut r = request("10", "EUR");
        r.release_conditions = Some(json!(["x"]));
        assert!(r.validate().unwrap_err().is_code("INVALID_PAYLOAD"));
    }
}
