// Business domains
//
// Each domain keeps its SQL in models/, its use cases in actions/ and its
// request/response shapes in data.rs.

pub mod api_keys;
pub mod audit;
pub mod escrow;
pub mod idempotency;
pub mod mandates;
pub mod milestones;
pub mod payments;
pub mod proofs;
pub mod scheduler;
pub mod spend;
pub mod transactions;
pub mod users;
pub mod webhooks;
