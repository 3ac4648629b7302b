pub mod allowlist;
pub mod mandate;
pub mod merchant;
pub mod purchase;

pub use allowlist::AllowlistEntry;
pub use mandate::{MandateStatus, UsageMandate};
pub use merchant::Merchant;
pub use purchase::Purchase;
