pub mod deposit;
pub mod escrow;
pub mod escrow_event;
pub mod funding_intent;

pub use deposit::EscrowDeposit;
pub use escrow::{Escrow, EscrowDomain, EscrowStatus};
pub use escrow_event::{EscrowEvent, EscrowEventKind};
pub use funding_intent::{FundingIntent, FundingStatus};
