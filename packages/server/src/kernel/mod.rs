//! Kernel module - server infrastructure and dependencies.

pub mod ai;
pub mod circuit_breaker;
pub mod deps;
pub mod ocr;
pub mod psp;
pub mod scheduled_tasks;
pub mod secrets;
pub mod test_dependencies;
pub mod traits;

pub use deps::{SchedulerState, ServerDeps};
pub use scheduled_tasks::{start_scheduler, stop_scheduler};
pub use test_dependencies::TestDependencies;
pub use traits::*;
