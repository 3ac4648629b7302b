/// API-key authentication primitives.
///
/// Route handlers receive a resolved [`Principal`] and guard with ordinary
/// checks:
///
/// ```rust
/// use escrow_core::common::auth::{Principal, Scope};
///
/// let principal = Principal::legacy();
/// principal.require(Scope::Support).unwrap();
/// ```
mod principal;
mod scope;
pub mod token;

pub use principal::{Credential, Principal};
pub use scope::Scope;
