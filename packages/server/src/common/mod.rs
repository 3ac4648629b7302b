// Common types and utilities shared across the application

pub mod auth;
pub mod clock;
pub mod entity_ids;
pub mod errors;
pub mod id;
pub mod money;
pub mod pii;
pub mod utils;

pub use auth::{Principal, Scope};
pub use clock::{BaseClock, FixedClock, SystemClock};
pub use entity_ids::*;
pub use errors::{AppError, AppResult};
pub use id::Id;
pub use money::{Currency, Money, MoneyError};
