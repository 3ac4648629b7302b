mod create_user;

pub use create_user::create_user;
