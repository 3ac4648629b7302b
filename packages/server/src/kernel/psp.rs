// Stub payment service provider
//
// Issues opaque references without any network call. Settlement arrives
// later through the signed webhook, exactly as with a real PSP.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::traits::{BasePspClient, PayoutRequest};
use crate::common::{Currency, EscrowId, Money};

#[derive(Debug, Default, Clone)]
pub struct StubPspClient;

impl StubPspClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BasePspClient for StubPspClient {
    async fn create_payout(&self, request: &PayoutRequest) -> Result<String> {
        let psp_ref = format!("psp-{}", Uuid::new_v4());
        info!(
            escrow_id = %request.escrow_id,
            payment_id = %request.payment_id,
            amount = %request.amount,
            currency = %request.currency,
            psp_ref = %psp_ref,
            "Payout submitted to PSP"
        );
        Ok(psp_ref)
    }

    async fn create_funding_intent(
        &self,
        escrow_id: EscrowId,
        amount: Money,
        currency: Currency,
    ) -> Result<String> {
        let intent_id = format!("fi-{}", Uuid::new_v4());
        info!(
            escrow_id = %escrow_id,
            amount = %amount,
            currency = %currency,
            intent_id = %intent_id,
            "Funding intent opened"
        );
        Ok(intent_id)
    }
}
