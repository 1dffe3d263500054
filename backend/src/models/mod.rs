pub mod auth;
pub mod billing;
pub mod conversations;
pub mod messages;
pub mod user_settings;
pub mod users;
