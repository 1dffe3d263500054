use std::time::Duration;

use tracing::warn;

use crate::errors::AppError;
use crate::state::DbPool;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(100);

/// Acquires a pooled connection, retrying transient pool failures with
/// exponential backoff before giving up with a 500-class error.
///
/// # Errors
///
/// Returns `AppError::DbPoolError` once all attempts are exhausted.
pub async fn get_conn(pool: &DbPool) -> Result<deadpool_diesel::postgres::Connection, AppError> {
    let mut delay = BASE_DELAY;
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        match pool.get().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(attempt, error = %e, "Failed to acquire database connection");
                last_error = e.to_string();
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(AppError::DbPoolError(last_error))
}
