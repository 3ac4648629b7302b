mod create_transaction;

pub use create_transaction::create_transaction;
