use std::sync::Arc;

use crate::auth::otp::OtpStore;
use crate::config::Config;
use crate::llm::ollama::OllamaClient;
use crate::services::email_service::EmailService;
use crate::services::entitlements::EntitlementService;

// --- DB Connection Pool Type ---
pub type DbPool = deadpool_diesel::postgres::Pool;

// --- Shared application state ---
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub gateway: Arc<OllamaClient>,
    pub otp_store: Arc<OtpStore>,
    pub email: Arc<dyn EmailService>,
    pub entitlements: Arc<dyn EntitlementService>,
}
