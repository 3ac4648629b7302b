//! Payments domain - payouts out of an escrow and their settlement.

pub mod actions;
pub mod balance;
pub mod data;
pub mod models;

pub use balance::EscrowBalance;
pub use data::PaymentData;
pub use models::{Payment, PaymentStatus};
