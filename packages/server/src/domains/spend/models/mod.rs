pub mod allowed_payee;

pub use allowed_payee::AllowedPayee;
