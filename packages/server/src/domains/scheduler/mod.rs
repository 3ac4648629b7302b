//! Scheduler domain - the lease and the periodic maintenance pass.

pub mod actions;
pub mod models;

pub use actions::{run_tick, TickReport};
pub use models::SchedulerLock;
