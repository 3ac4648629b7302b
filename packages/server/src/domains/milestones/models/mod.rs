pub mod milestone;

pub use milestone::{Geofence, Milestone, MilestoneStatus, NewMilestone};
