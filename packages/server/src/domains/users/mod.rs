//! Users domain - clients, providers, senders and beneficiaries.

pub mod actions;
pub mod data;
pub mod models;

pub use data::{CreateUserRequest, UserData};
pub use models::user::{PublicRole, User};
