mod funding;
mod ledger;

pub use funding::{
    create_funding_intent, funding_deposit_key, mark_funding_failed, mark_funding_succeeded,
};
pub use ledger::{
    apply_deposit, cancel, check_deadline, client_approve, client_reject, create_escrow, deposit,
    mark_delivered, refund, view, DepositOutcome,
};
pub(crate) use ledger::escrow_not_found;
