pub mod admin_settings;
pub mod employee;
pub mod overtime_record;
pub mod profile;
pub mod user_secret;
