mod api_key_auth;

pub use api_key_auth::{api_key_auth_middleware, API_KEY_HEADER};
