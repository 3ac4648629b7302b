pub mod idempotency_record;

pub use idempotency_record::IdempotencyRecord;
