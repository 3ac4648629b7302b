//! Typed ID definitions for all domain entities.
//!
//! # Example
//!
//! ```rust
//! use escrow_core::common::{EscrowId, PaymentId};
//!
//! let escrow_id = EscrowId::new(1);
//! let payment_id = PaymentId::new(1);
//!
//! // These are incompatible types, so this would not compile:
//! // let wrong: PaymentId = escrow_id;
//! # let _ = (escrow_id, payment_id);
//! ```

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for User entities (clients, providers, beneficiaries).
pub struct User;

/// Marker type for Escrow aggregates.
pub struct Escrow;

/// Marker type for EscrowDeposit rows.
pub struct EscrowDeposit;

/// Marker type for EscrowEvent rows.
pub struct EscrowEvent;

/// Marker type for FundingIntent rows.
pub struct FundingIntent;

/// Marker type for Milestone entities.
pub struct Milestone;

/// Marker type for Proof entities.
pub struct Proof;

/// Marker type for Payment entities.
pub struct Payment;

/// Marker type for UsageMandate entities.
pub struct UsageMandate;

/// Marker type for Merchant entities.
pub struct Merchant;

/// Marker type for BeneficiaryAllowlist entries.
pub struct AllowlistEntry;

/// Marker type for Purchase entities.
pub struct Purchase;

/// Marker type for AllowedPayee entities.
pub struct AllowedPayee;

/// Marker type for direct Transaction records.
pub struct Transaction;

/// Marker type for PSP webhook events.
pub struct PspWebhookEvent;

/// Marker type for API keys.
pub struct ApiKey;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type UserId = Id<User>;
pub type EscrowId = Id<Escrow>;
pub type DepositId = Id<EscrowDeposit>;
pub type EscrowEventId = Id<EscrowEvent>;
pub type FundingIntentId = Id<FundingIntent>;
pub type MilestoneId = Id<Milestone>;
pub type ProofId = Id<Proof>;
pub type PaymentId = Id<Payment>;
pub type MandateId = Id<UsageMandate>;
pub type MerchantId = Id<Merchant>;
pub type AllowlistEntryId = Id<AllowlistEntry>;
pub type PurchaseId = Id<Purchase>;
pub type PayeeId = Id<AllowedPayee>;
pub type TransactionId = Id<Transaction>;
pub type WebhookEventId = Id<PspWebhookEvent>;
pub type ApiKeyId = Id<ApiKey>;
