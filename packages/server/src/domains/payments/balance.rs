use serde::Serialize;
use sqlx::PgConnection;

use crate::common::{AppError, AppResult, EscrowId, Money};
use crate::domains::escrow::models::EscrowDeposit;
use crate::domains::payments::models::{Payment, PaymentStatus};

/// Money position of one escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EscrowBalance {
    pub deposited: Money,
    /// SENT + SETTLED
    pub disbursed: Money,
    /// PENDING payments not yet handed to the PSP
    pub reserved: Money,
}

impl EscrowBalance {
    /// `deposited - disbursed`
    pub fn available(&self) -> Money {
        self.deposited.saturating_sub(self.disbursed)
    }

    /// What a new payout may still draw on.
    pub fn spendable(&self) -> Money {
        self.available().saturating_sub(self.reserved)
    }

    pub async fn load(escrow_id: EscrowId, conn: &mut PgConnection) -> AppResult<Self> {
        let deposited = EscrowDeposit::total_for_escrow(escrow_id, conn).await?;
        let disbursed = Payment::sum_with_status(
            escrow_id,
            &[PaymentStatus::Sent, PaymentStatus::Settled],
            conn,
        )
        .await?;
        let reserved = Payment::sum_with_status(escrow_id, &[PaymentStatus::Pending], conn).await?;
        Ok(Self {
            deposited,
            disbursed,
            reserved,
        })
    }

    pub fn ensure_covers(&self, amount: Money) -> AppResult<()> {
        let covered = self
            .reserved
            .checked_add(amount)
            .is_some_and(|needed| needed <= self.available());
        if !covered {
            return Err(AppError::conflict(
                "INSUFFICIENT_ESCROW_BALANCE",
                format!(
                    "escrow can pay out {} but {} was requested",
                    self.spendable(),
                    amount
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spendable_subtracts_reserved() {
        let balance = EscrowBalance {
            deposited: Money::from_cents(100_00),
            disbursed: Money::from_cents(30_00),
            reserved: Money::from_cents(20_00),
        };
        assert_eq!(balance.available(), Money::from_cents(70_00));
        assert_eq!(balance.spendable(), Money::from_cents(50_00));
        assert!(balance.ensure_covers(Money::from_cents(50_00)).is_ok());
        assert!(balance
            .ensure_covers(Money::from_cents(50_01))
            .unwrap_err()
            .is_code("INSUFFICIENT_ESCROW_BALANCE"));
    }

    #[test]
    fn test_huge_request_is_refused_not_overflowed() {
        let balance = EscrowBalance {
            deposited: Money::MAX,
            disbursed: Money::ZERO,
            reserved: Money::from_cents(1),
        };
        assert!(balance
            .ensure_covers(Money::from_cents(i64::MAX))
            .unwrap_err()
            .is_code("INSUFFICIENT_ESCROW_BALANCE"));
        assert!(balance.ensure_covers(balance.spendable()).is_ok());
    }
}
