use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::common::{AppError, AppResult, EscrowId, Money, PayeeId};

/// A payee an escrow may disburse to directly, with optional caps
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AllowedPayee {
    pub id: PayeeId,
    pub escrow_id: EscrowId,
    pub payee_ref: String,
    pub label: String,
    pub daily_limit: Option<Money>,
    pub total_limit: Option<Money>,
    pub spent_today: Money,
    pub spent_total: Money,
    /// Day `spent_today` counts for
    pub last_reset_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl AllowedPayee {
    /// What `spent_today` is worth on `today`.
    pub fn spent_on(&self, today: NaiveDate) -> Money {
        if self.last_reset_date == today {
            self.spent_today
        } else {
            Money::ZERO
        }
    }

    /// Check `amount` against both caps. Reaching a cap exactly is allowed.
    pub fn check_limits(&self, amount: Money, today: NaiveDate) -> AppResult<()> {
        if let Some(limit) = self.daily_limit {
            if exceeds(self.spent_on(today), amount, limit) {
                return Err(AppError::validation(
                    "DAILY_LIMIT_EXCEEDED",
                    format!("daily limit {} for payee '{}' would be exceeded", limit, self.payee_ref),
                ));
            }
        }
        if let Some(limit) = self.total_limit {
            if exceeds(self.spent_total, amount, limit) {
                return Err(AppError::validation(
                    "TOTAL_LIMIT_EXCEEDED",
                    format!("total limit {} for payee '{}' would be exceeded", limit, self.payee_ref),
                ));
            }
        }
        Ok(())
    }
}

/// An addition that leaves the money range is over any cap.
fn exceeds(spent: Money, amount: Money, limit: Money) -> bool {
    spent
        .checked_add(amount)
        .map_or(true, |after| after > limit)
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl AllowedPayee {
    /// Register a payee; `None` when the escrow already has this `payee_ref`.
    pub async fn create(
        escrow_id: EscrowId,
        payee_ref: &str,
        label: &str,
        daily_limit: Option<Money>,
        total_limit: Option<Money>,
        today: NaiveDate,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let payee = sqlx::query_as::<_, AllowedPayee>(
            r#"
            INSERT INTO allowed_payees (
                escrow_id,
                payee_ref,
                label,
                daily_limit,
                total_limit,
                last_reset_date
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (escrow_id, payee_ref) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(escrow_id)
        .bind(payee_ref)
        .bind(label)
        .bind(daily_limit)
        .bind(total_limit)
        .bind(today)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(payee)
    }

    pub async fn lock_by_ref(
        escrow_id: EscrowId,
        payee_ref: &str,
        conn: &mut PgConnection,
    ) -> Result<Option<Self>> {
        let payee = sqlx::query_as::<_, AllowedPayee>(
            "SELECT * FROM allowed_payees WHERE escrow_id = $1 AND payee_ref = $2 FOR UPDATE",
        )
        .bind(escrow_id)
        .bind(payee_ref)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(payee)
    }

    /// Add a spend to both counters, restarting the daily one when the day
    /// changed.
    pub async fn record_spend(
        id: PayeeId,
        amount: Money,
        today: NaiveDate,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        let payee = sqlx::query_as::<_, AllowedPayee>(
            r#"
            UPDATE allowed_payees
            SET spent_today = CASE WHEN last_reset_date = $3 THEN spent_today ELSE 0 END + $2,
                spent_total = spent_total + $2,
                last_reset_date = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(today)
        .fetch_one(&mut *conn)
        .await?;
        Ok(payee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payee(daily: Option<&str>, total: Option<&str>, today: &str, spent_total: &str) -> AllowedPayee {
        AllowedPayee {
            id: PayeeId::new(1),
            escrow_id: EscrowId::new(1),
            payee_ref: "acct_landlord".to_string(),
            label: "Landlord".to_string(),
            daily_limit: daily.map(|d| d.parse().unwrap()),
            total_limit: total.map(|t| t.parse().unwrap()),
            spent_today: today.parse().unwrap(),
            spent_total: spent_total.parse().unwrap(),
            last_reset_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_limit_accepts_exact_amount() {
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let p = payee(None, Some("100.00"), "0", "60.00");
        assert!(p.check_limits("40.00".parse().unwrap(), day).is_ok());
        let err = p.check_limits("40.01".parse().unwrap(), day).unwrap_err();
        assert!(err.is_code("TOTAL_LIMIT_EXCEEDED"));
    }

    #[test]
    fn test_daily_counter_resets_on_new_day() {
        let p = payee(Some("50.00"), None, "45.00", "45.00");
        let same_day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let next_day = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();

        let err = p.check_limits("10.00".parse().unwrap(), same_day).unwrap_err();
        assert!(err.is_code("DAILY_LIMIT_EXCEEDED"));
        assert!(p.check_limits("10.00".parse().unwrap(), next_day).is_ok());
        assert_eq!(p.spent_on(next_day), Money::ZERO);
    }

    #[test]
    fn test_amount_past_money_range_is_over_the_limit() {
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let p = payee(Some("100.00"), Some("100.00"), "0.01", "0.01");

        let err = p.check_limits(Money::from_cents(i64::MAX), day).unwrap_err();
        assert!(err.is_code("DAILY_LIMIT_EXCEEDED"));

        let total_only = payee(None, Some("100.00"), "0", "0.01");
        let err = total_only.check_limits(Money::MAX, day).unwrap_err();
        assert!(err.is_code("TOTAL_LIMIT_EXCEEDED"));
    }
}
