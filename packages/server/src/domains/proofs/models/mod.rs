pub mod proof;

pub use proof::{NewProof, Proof, ProofKind, ProofStatus};
