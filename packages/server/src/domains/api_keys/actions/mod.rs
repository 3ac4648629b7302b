mod authenticate;
mod issue_api_key;

pub use authenticate::authenticate;
pub use issue_api_key::issue_api_key;
