pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod models;
pub mod prompt_builder;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;

// Library-wide pool alias
pub type PgPool = deadpool_diesel::postgres::Pool;

pub use state::AppState;
