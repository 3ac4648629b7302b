pub mod user;

pub use user::{PublicRole, User};
