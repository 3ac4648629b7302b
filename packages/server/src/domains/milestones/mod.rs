//! Milestones domain - sequential tranches of an escrow released against proof.

pub mod actions;
pub mod data;
pub mod machines;
pub mod models;

pub use data::{CreateMilestoneRequest, MilestoneData};
pub use machines::{next_status, MilestoneEvent};
pub use models::{Geofence, Milestone, MilestoneStatus};
