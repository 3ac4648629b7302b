pub mod fingerprint;
pub mod geo;

pub use fingerprint::*;
pub use geo::*;
