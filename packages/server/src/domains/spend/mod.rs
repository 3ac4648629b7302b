//! Usage spend - direct disbursements from an escrow to registered payees.

pub mod actions;
pub mod data;
pub mod models;

pub use data::{AllowedPayeeData, RegisterPayeeRequest, SpendData, SpendRequest};
pub use models::AllowedPayee;
