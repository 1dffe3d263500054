use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Errors that can occur when sending emails
#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Invalid email configuration: {0}")]
    ConfigurationError(String),
}

/// Result type for email operations
pub type EmailResult<T> = Result<T, EmailError>;

/// Trait defining email sending capabilities. Actual SMTP delivery is an
/// external collaborator; implementations only decide how a message leaves
/// the process.
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Send a one-time password for login verification.
    async fn send_otp_email(&self, to_email: &str, otp: &str) -> EmailResult<()>;

    /// Send a welcome message after a user's first successful login.
    async fn send_welcome_email(&self, to_email: &str, username: &str) -> EmailResult<()>;
}

/// Development email service that logs messages to the console instead of
/// delivering them.
#[derive(Debug, Clone, Default)]
pub struct LoggingEmailService;

#[async_trait]
impl EmailService for LoggingEmailService {
    async fn send_otp_email(&self, to_email: &str, otp: &str) -> EmailResult<()> {
        info!(
            to_email = %to_email,
            "EMAIL (DEV MODE) - verification code, valid 10 minutes"
        );

        println!("\nYour verification code for {to_email}:");
        println!("   {otp}");
        println!("   (This would normally be sent by email)\n");

        Ok(())
    }

    async fn send_welcome_email(&self, to_email: &str, username: &str) -> EmailResult<()> {
        info!(
            to_email = %to_email,
            username = %username,
            "EMAIL (DEV MODE) - welcome message"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_service_always_succeeds() {
        let service = LoggingEmailService;
        assert!(service
            .send_otp_email("alice@example.com", "123456")
            .await
            .is_ok());
        assert!(service
            .send_welcome_email("alice@example.com", "alice")
            .await
            .is_ok());
    }
}
