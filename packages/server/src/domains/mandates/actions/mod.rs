mod create_mandate;
mod expire_mandates;
mod merchants;
mod purchase;

pub use create_mandate::create_mandate;
pub use expire_mandates::expire_mandates;
pub use merchants::{add_allowlist_entry, create_merchant};
pub use purchase::purchase;
