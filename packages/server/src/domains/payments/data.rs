use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{Payment, PaymentStatus};
use crate::common::{EscrowId, MilestoneId, Money, PaymentId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentData {
    pub id: PaymentId,
    pub escrow_id: EscrowId,
    pub milestone_id: Option<MilestoneId>,
    pub amount: Money,
    pub status: PaymentStatus,
    pub psp_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentData {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            escrow_id: p.escrow_id,
            milestone_id: p.milestone_id,
            amount: p.amount,
            status: p.status,
            psp_ref: p.psp_ref,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}
