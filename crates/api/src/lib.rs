pub mod auth;
pub mod schema;
pub mod session;
