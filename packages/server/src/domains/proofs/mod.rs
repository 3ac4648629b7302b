//! Proofs domain - evidence intake, rule checks, advisory review and decisions.

pub mod actions;
pub mod advisor_context;
pub mod data;
pub mod invoice;
pub mod models;
pub mod rules;

pub use data::{ProofData, ProofDecisionRequest, ProofOutcome, SubmitProofRequest};
pub use models::{Proof, ProofKind, ProofStatus};
