pub mod scheduler_lock;

pub use scheduler_lock::SchedulerLock;
