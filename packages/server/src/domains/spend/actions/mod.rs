mod register_payee;
mod spend;

pub use register_payee::register_payee;
pub use spend::spend;
