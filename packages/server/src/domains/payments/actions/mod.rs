mod execute_payment;
mod executor;
mod retry_pending;
mod settlement;

pub use execute_payment::execute_payment;
pub use executor::{execute, payout_key, send_pending};
pub use retry_pending::retry_pending_payouts;
pub use settlement::{close_if_complete, finalize_settlement, mark_failed};
