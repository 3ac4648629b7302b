mod decide_proof;
mod release;
mod submit_proof;

pub use decide_proof::decide_proof;
pub use submit_proof::{submit_proof, FLAG_PROOF_KIND_MISMATCH, MANUAL_VALIDATOR};
