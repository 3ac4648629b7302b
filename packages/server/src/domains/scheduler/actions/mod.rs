pub mod lease;
mod tick;

pub use lease::{release, try_acquire, DEFAULT_LEASE};
pub use tick::{run_tick, TickReport};
