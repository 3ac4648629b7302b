//! Escrow state machine - pure decision logic
//!
//! Deposits move DRAFT → FUNDED once the total is covered; everything else is
//! driven by an explicit [`EscrowEvent`].

use super::models::EscrowStatus;
use crate::common::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowEvent {
    MarkDelivered,
    ClientApprove,
    ClientReject,
    DeadlineRelease,
    Cancel,
    Refund,
    /// Every milestone has been paid
    Close,
}

/// Next status for `event`, or `None` when the transition is not allowed.
pub fn next_status(from: EscrowStatus, event: EscrowEvent) -> Option<EscrowStatus> {
    use EscrowEvent::*;
    use EscrowStatus::*;

    match (from, event) {
        (Funded | Releasable, MarkDelivered) => Some(Releasable),
        (Releasable, ClientApprove) => Some(Released),
        (Releasable, ClientReject) => Some(Funded),
        (Funded, DeadlineRelease) => Some(Released),
        (Draft, Cancel) => Some(Cancelled),
        (Funded | Releasable, Refund) => Some(Refunded),
        (s, Close) if !s.is_terminal() => Some(Released),
        _ => None,
    }
}

/// Status after a deposit brings the escrow to `deposited`.
pub fn status_after_deposit(
    current: EscrowStatus,
    deposited: Money,
    amount_total: Money,
) -> EscrowStatus {
    if current == EscrowStatus::Draft && deposited >= amount_total {
        EscrowStatus::Funded
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EscrowEvent::*;
    use EscrowStatus::*;

    #[test]
    fn test_delivery_cycle() {
        assert_eq!(next_status(Funded, MarkDelivered), Some(Releasable));
        assert_eq!(next_status(Releasable, MarkDelivered), Some(Releasable));
        assert_eq!(next_status(Releasable, ClientReject), Some(Funded));
        assert_eq!(next_status(Releasable, ClientApprove), Some(Released));
        assert_eq!(next_status(Draft, MarkDelivered), None);
        assert_eq!(next_status(Funded, ClientApprove), None);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for status in [Released, Refunded, Cancelled] {
            for event in [
                MarkDelivered,
                ClientApprove,
                ClientReject,
                DeadlineRelease,
                Cancel,
                Refund,
                Close,
            ] {
                assert_eq!(next_status(status, event), None, "{:?} {:?}", status, event);
            }
        }
    }

    #[test]
    fn test_deposit_to_exact_total_funds() {
        let total = Money::from_cents(10_000);
        assert_eq!(status_after_deposit(Draft, Money::from_cents(9_999), total), Draft);
        assert_eq!(status_after_deposit(Draft, total, total), Funded);
        assert_eq!(status_after_deposit(Releasable, total, total), Releasable);
    }

    #[test]
    fn test_deadline_only_from_funded() {
        assert_eq!(next_status(Funded, DeadlineRelease), Some(Released));
        assert_eq!(next_status(Releasable, DeadlineRelease), None);
        assert_eq!(next_status(Draft, DeadlineRelease), None);
    }
}
