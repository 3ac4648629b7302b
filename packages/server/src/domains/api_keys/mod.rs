//! API keys - issuance and request authentication.

pub mod actions;
pub mod data;
pub mod models;

pub use data::{IssueApiKeyRequest, IssuedApiKeyData};
pub use models::ApiKey;
