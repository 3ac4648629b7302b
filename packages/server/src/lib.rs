// Conditional-Transfer Escrow - API Core
//
// Backend for escrows released milestone by milestone against proof, plus
// capped spending mandates and direct payee spends.
//
// Business logic lives per-domain in domains/*/{models,actions}; the HTTP
// facade in server/ only parses, authorizes and translates errors.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
