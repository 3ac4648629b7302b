use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{AllowlistEntry, MandateStatus, Merchant, Purchase, UsageMandate};
use crate::common::{
    AllowlistEntryId, AppError, AppResult, Currency, MandateId, MerchantId, Money, PurchaseId,
    UserId,
};

fn parse_currency(raw: &str) -> AppResult<Currency> {
    raw.parse().map_err(|_| {
        AppError::validation(
            "UNSUPPORTED_CURRENCY",
            format!("currency '{}' is not supported", raw),
        )
    })
}

fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMandateRequest {
    pub sender_id: UserId,
    pub beneficiary_id: UserId,
    pub total_amount: Money,
    pub currency: String,
    #[serde(default)]
    pub allowed_category: Option<String>,
    #[serde(default)]
    pub allowed_merchant_id: Option<MerchantId>,
    pub expires_at: DateTime<Utc>,
}

impl CreateMandateRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> AppResult<Currency> {
        if !self.total_amount.is_positive() {
            return Err(AppError::invalid_amount("total_amount must be positive"));
        }
        if self.expires_at <= now {
            return Err(AppError::validation(
                "INVALID_EXPIRY",
                "expires_at must be in the future",
            ));
        }
        parse_currency(&self.currency)
    }

    pub fn allowed_category(&self) -> Option<String> {
        clean_text(self.allowed_category.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMerchantRequest {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub is_certified: bool,
}

impl CreateMerchantRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() || self.category.trim().is_empty() {
            return Err(AppError::bad_request(
                "INVALID_PAYLOAD",
                "name and category are required",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowlistRequest {
    pub beneficiary_id: UserId,
    #[serde(default)]
    pub merchant_id: Option<MerchantId>,
    #[serde(default)]
    pub category: Option<String>,
}

impl AllowlistRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.merchant_id.is_none() && clean_text(self.category.as_deref()).is_none() {
            return Err(AppError::bad_request(
                "INVALID_PAYLOAD",
                "merchant_id or category is required",
            ));
        }
        Ok(())
    }

    pub fn category(&self) -> Option<String> {
        clean_text(self.category.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub sender_id: UserId,
    /// Defaults to the user bound to the calling API key
    #[serde(default)]
    pub beneficiary_id: Option<UserId>,
    pub merchant_id: MerchantId,
    pub amount: Money,
    pub currency: String,
}

impl PurchaseRequest {
    pub fn validate(&self) -> AppResult<Currency> {
        if !self.amount.is_positive() {
            return Err(AppError::invalid_amount("amount must be positive"));
        }
        parse_currency(&self.currency)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateData {
    pub id: MandateId,
    pub sender_id: UserId,
    pub beneficiary_id: UserId,
    pub total_amount: Money,
    pub total_spent: Money,
    pub remaining: Money,
    pub currency: Currency,
    pub allowed_category: Option<String>,
    pub allowed_merchant_id: Option<MerchantId>,
    pub expires_at: DateTime<Utc>,
    pub status: MandateStatus,
    pub created_at: DateTime<Utc>,
}

impl From<UsageMandate> for MandateData {
    fn from(m: UsageMandate) -> Self {
        let remaining = m.remaining();
        Self {
            id: m.id,
            sender_id: m.sender_id,
            beneficiary_id: m.beneficiary_id,
            total_amount: m.total_amount,
            total_spent: m.total_spent,
            remaining,
            currency: m.currency,
            allowed_category: m.allowed_category,
            allowed_merchant_id: m.allowed_merchant_id,
            expires_at: m.expires_at,
            status: m.status,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantData {
    pub id: MerchantId,
    pub name: String,
    pub category: String,
    pub is_certified: bool,
}

impl From<Merchant> for MerchantData {
    fn from(m: Merchant) -> Self {
        Self {
            id: m.id,
            name: m.name,
            category: m.category,
            is_certified: m.is_certified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowlistEntryData {
    pub id: AllowlistEntryId,
    pub beneficiary_id: UserId,
    pub merchant_id: Option<MerchantId>,
    pub category: Option<String>,
}

impl From<AllowlistEntry> for AllowlistEntryData {
    fn from(e: AllowlistEntry) -> Self {
        Self {
            id: e.id,
            beneficiary_id: e.beneficiary_id,
            merchant_id: e.merchant_id,
            category: e.category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseData {
    pub id: PurchaseId,
    pub mandate_id: MandateId,
    pub sender_id: UserId,
    pub beneficiary_id: UserId,
    pub merchant_id: MerchantId,
    pub category: String,
    pub amount: Money,
    pub currency: Currency,
    pub mandate_remaining: Money,
    pub mandate_status: MandateStatus,
    pub created_at: DateTime<Utc>,
}

impl PurchaseData {
    pub fn new(purchase: Purchase, mandate: &UsageMandate) -> Self {
        Self {
            id: purchase.id,
            mandate_id: purchase.mandate_id,
            sender_id: purchase.sender_id,
            beneficiary_id: purchase.beneficiary_id,
            merchant_id: purchase.merchant_id,
            category: purchase.category,
            amount: purchase.amount,
            currency: purchase.currency,
            mandate_remaining: mandate.remaining(),
            mandate_status: mandate.status,
            created_at: purchase.created_at,
        }
    }
}
