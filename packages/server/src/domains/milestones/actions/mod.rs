mod create_milestone;

pub use create_milestone::create_milestone;
