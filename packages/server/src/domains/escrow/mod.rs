//! Escrow domain - the ledger of deposits and the escrow lifecycle.
//!
//! ```text
//! DRAFT ──deposits ≥ total──▶ FUNDED ──mark delivered──▶ RELEASABLE ──approve──▶ RELEASED
//!   │                           │  ▲                          │
//!   │                           │  └─────────reject───────────┘
//!   └──cancel──▶ CANCELLED      ├──deadline passed──▶ RELEASED
//!                               └──refund──▶ REFUNDED
//! ```

pub mod actions;
pub mod data;
pub mod machines;
pub mod models;

pub use data::{CreateEscrowRequest, DeliveryRequest, EscrowData, EscrowView};
pub use models::{Escrow, EscrowDomain, EscrowStatus};
