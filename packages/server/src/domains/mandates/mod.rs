//! Mandates domain - capped spending a sender grants a beneficiary.

pub mod actions;
pub mod data;
pub mod models;

pub use data::{
    AllowlistEntryData, AllowlistRequest, CreateMandateRequest, CreateMerchantRequest,
    MandateData, MerchantData, PurchaseData, PurchaseRequest,
};
pub use models::{AllowlistEntry, MandateStatus, Merchant, Purchase, UsageMandate};
