//! PSP webhooks - signature check, replay protection and dispatch.

pub mod actions;
pub mod data;
pub mod models;
pub mod signature;

pub use actions::ingest_webhook;
pub use data::{WebhookAck, WebhookDelivery};
pub use models::PspWebhookEvent;
