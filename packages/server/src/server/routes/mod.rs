// HTTP routes
pub mod escrows;
pub mod health;
pub mod mandates;
pub mod proofs;
pub mod spend;
pub mod users;
pub mod webhooks;

pub use escrows::*;
pub use health::*;
pub use mandates::*;
pub use proofs::*;
pub use spend::*;
pub use users::*;
pub use webhooks::*;
