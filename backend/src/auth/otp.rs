use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

const OTP_LENGTH: u32 = 6;

/// Why a verification failed. Distinguished internally for logging; callers
/// are expected to surface a single generic message so the response does not
/// reveal whether a code exists, expired, or simply did not match.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("no code issued for this email")]
    NotIssued,
    #[error("code expired")]
    Expired,
    #[error("code mismatch")]
    Mismatch,
}

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    expires_at: Instant,
}

/// Process-wide store of pending one-time passwords, keyed by email.
/// Every read/write goes through one exclusion lock; expired entries are
/// dropped lazily on verify and in bulk by the periodic sweep task.
#[derive(Debug)]
pub struct OtpStore {
    entries: Mutex<HashMap<String, OtpEntry>>,
    ttl: Duration,
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issues a fresh 6-digit code for the email, replacing any pending one.
    pub fn issue(&self, email: &str) -> String {
        let code = format!(
            "{:06}",
            rand::thread_rng().gen_range(0..10u32.pow(OTP_LENGTH))
        );
        let entry = OtpEntry {
            code: code.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .lock()
            .expect("OTP store lock poisoned")
            .insert(email.to_string(), entry);
        debug!(email = %email, "Issued OTP");
        code
    }

    /// Verifies and consumes the pending code for the email. Codes are
    /// single-use: success removes the entry, as does an expired entry.
    ///
    /// # Errors
    ///
    /// Returns the precise failure cause; see [`OtpError`].
    pub fn verify(&self, email: &str, code: &str) -> Result<(), OtpError> {
        let mut entries = self.entries.lock().expect("OTP store lock poisoned");

        let Some(entry) = entries.get(email) else {
            warn!(email = %email, "OTP verification failed: no code issued");
            return Err(OtpError::NotIssued);
        };

        if entry.expires_at <= Instant::now() {
            entries.remove(email);
            warn!(email = %email, "OTP verification failed: code expired");
            return Err(OtpError::Expired);
        }

        if entry.code != code {
            warn!(email = %email, "OTP verification failed: code mismatch");
            return Err(OtpError::Mismatch);
        }

        entries.remove(email);
        debug!(email = %email, "OTP verified");
        Ok(())
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("OTP store lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn pending(&self) -> usize {
        self.entries.lock().expect("OTP store lock poisoned").len()
    }
}

/// Spawns the low-priority background task that sweeps expired codes on the
/// configured interval.
pub fn spawn_sweeper(store: Arc<OtpStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so the sweep cadence starts
        // one interval from now.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep();
            if removed > 0 {
                info!(removed, "Swept expired OTP entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let store = OtpStore::new(Duration::from_secs(600));
        let code = store.issue("alice@example.com");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(store.verify("alice@example.com", &code), Ok(()));
    }

    #[test]
    fn test_codes_are_single_use() {
        let store = OtpStore::new(Duration::from_secs(600));
        let code = store.issue("alice@example.com");
        assert_eq!(store.verify("alice@example.com", &code), Ok(()));
        assert_eq!(
            store.verify("alice@example.com", &code),
            Err(OtpError::NotIssued)
        );
    }

    #[test]
    fn test_mismatched_code_is_not_consumed() {
        let store = OtpStore::new(Duration::from_secs(600));
        let code = store.issue("alice@example.com");
        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert_eq!(
            store.verify("alice@example.com", wrong),
            Err(OtpError::Mismatch)
        );
        // The real code still works after a failed attempt.
        assert_eq!(store.verify("alice@example.com", &code), Ok(()));
    }

    #[test]
    fn test_unknown_email() {
        let store = OtpStore::new(Duration::from_secs(600));
        assert_eq!(
            store.verify("nobody@example.com", "123456"),
            Err(OtpError::NotIssued)
        );
    }

    #[test]
    fn test_expired_code_is_rejected_and_removed() {
        let store = OtpStore::new(Duration::from_millis(0));
        let code = store.issue("alice@example.com");
        assert_eq!(
            store.verify("alice@example.com", &code),
            Err(OtpError::Expired)
        );
        // Entry was dropped on the expired read.
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_reissue_replaces_previous_code() {
        let store = OtpStore::new(Duration::from_secs(600));
        let first = store.issue("alice@example.com");
        let second = store.issue("alice@example.com");
        assert_eq!(store.pending(), 1);
        if first != second {
            assert_eq!(
                store.verify("alice@example.com", &first),
                Err(OtpError::Mismatch)
            );
        }
        assert_eq!(store.verify("alice@example.com", &second), Ok(()));
    }

    #[test]
    fn test_sweep_removes_expired_entries() {
        let expired = OtpStore::new(Duration::from_millis(0));
        expired.issue("old@example.com");
        assert_eq!(expired.sweep(), 1);
        assert_eq!(expired.pending(), 0);

        let fresh = OtpStore::new(Duration::from_secs(600));
        fresh.issue("fresh@example.com");
        assert_eq!(fresh.sweep(), 0);
        assert_eq!(fresh.pending(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_task_drains_expired_entries() {
        let store = Arc::new(OtpStore::new(Duration::from_millis(0)));
        store.issue("alice@example.com");
        let handle = spawn_sweeper(store.clone(), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.pending(), 0);
        handle.abort();
    }
}
