pub mod psp_webhook_event;

pub use psp_webhook_event::PspWebhookEvent;
