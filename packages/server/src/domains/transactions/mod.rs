//! Transactions domain - operator-recorded direct transfers.

pub mod actions;
pub mod data;
pub mod models;

pub use data::{CreateTransactionRequest, TransactionData};
pub use models::Transaction;
