mod ingest;

pub use ingest::ingest_webhook;
