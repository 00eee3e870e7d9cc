use sqlx::{FromRow, SqlitePool};

use crate::config::Config;
use crate::error::{AppError, Result};

/// Limits applied to failed logins per username
#[derive(Debug, Clone, Copy)]
pub struct LoginPolicy {
    pub max_failures: u32,
    pub window_secs: i64,
    pub lockout_secs: i64,
}

impl LoginPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_failures: config.login_max_failures,
            window_secs: config.login_window_secs,
            lockout_secs: config.login_lockout_secs,
        }
    }
}

/// Failed-login tracking for one username
#[derive(Debug, Clone, FromRow)]
pub struct LoginAttempt {
    pub username: String,
    /// Failures counted in the current window
    pub failures: i64,
    /// Unix timestamp when the failure counter resets
    pub window_reset_at: i64,
    /// Unix timestamp until which logins are refused
    pub locked_until: Option<i64>,
}

impl LoginAttempt {
    /// Create a fresh record with its window starting now
    pub fn new(username: &str, now: i64, policy: &LoginPolicy) -> Self {
        Self {
            username: username.to_string(),
            failures: 0,
            window_reset_at: now + policy.window_secs,
            locked_until: None,
        }
    }

    /// Refuse the attempt while a lockout is active
    pub fn check(&self, now: i64) -> Result<()> {
        match self.locked_until {
            Some(until) if now < until => {
                tracing::warn!(
                    "Login refused for locked username {} ({}s remaining)",
                    self.username,
                    until - now
                );
                Err(AppError::TooManyAttempts)
            }
            _ => Ok(()),
        }
    }

    /// Count a failure; returns true when this failure triggers a lockout
    pub fn record_failure(&mut self, now: i64, policy: &LoginPolicy) -> bool {
        // Reset counter if the window has expired
        if now >= self.window_reset_at {
            self.failures = 0;
            self.window_reset_at = now + policy.window_secs;
        }

        self.failures += 1;

        if self.failures >= i64::from(policy.max_failures) {
            tracing::warn!(
                "Locking username {} after {} failed logins",
                self.username,
                self.failures
            );
            self.locked_until = Some(now + policy.lockout_secs);
            self.failures = 0;
            self.window_reset_at = now + policy.window_secs;
            return true;
        }

        false
    }

    pub async fn load(pool: &SqlitePool, username: &str) -> std::result::Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LoginAttempt>("SELECT * FROM login_attempts WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    pub async fn save(&self, pool: &SqlitePool) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO login_attempts (username, failures, window_reset_at, locked_until)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(username) DO UPDATE SET
                   failures = excluded.failures,
                   window_reset_at = excluded.window_reset_at,
                   locked_until = excluded.locked_until"#,
        )
        .bind(&self.username)
        .bind(self.failures)
        .bind(self.window_reset_at)
        .bind(self.locked_until)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Drop rows whose window and lockout have both run out
    pub async fn purge_expired(pool: &SqlitePool, now: i64) -> std::result::Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"DELETE FROM login_attempts
               WHERE window_reset_at <= ? AND (locked_until IS NULL OR locked_until <= ?)"#,
        )
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Forget all failures after a successful login
    pub async fn clear(pool: &SqlitePool, username: &str) -> std::result::Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM login_attempts WHERE username = ?")
            .bind(username)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: LoginPolicy = LoginPolicy {
        max_failures: 3,
        window_secs: 600,
        lockout_secs: 900,
    };

    #[test]
    fn test_new_login_attempt() {
        let now = 1000000;
        let attempt = LoginAttempt::new("alice", now, &POLICY);

        assert_eq!(attempt.failures, 0);
        assert!(attempt.locked_until.is_none());
        assert_eq!(attempt.window_reset_at, now + 600);
        assert!(attempt.check(now).is_ok());
    }

    #[test]
    fn test_lockout_after_max_failures() {
        let now = 1000000;
        let mut attempt = LoginAttempt::new("alice", now, &POLICY);

        assert!(!attempt.record_failure(now, &POLICY));
        assert!(!attempt.record_failure(now + 1, &POLICY));
        assert!(attempt.record_failure(now + 2, &POLICY));

        assert!(matches!(
            attempt.check(now + 3),
            Err(AppError::TooManyAttempts)
        ));
    }

    #[test]
    fn test_lockout_expires() {
        let now = 1000000;
        let mut attempt = LoginAttempt::new("alice", now, &POLICY);
        for _ in 0..POLICY.max_failures {
            attempt.record_failure(now, &POLICY);
        }

        assert!(attempt.check(now + 899).is_err());
        assert!(attempt.check(now + 900).is_ok());
    }

    #[test]
    fn test_window_reset_forgets_old_failures() {
        let now = 1000000;
        let mut attempt = LoginAttempt::new("alice", now, &POLICY);

        attempt.record_failure(now, &POLICY);
        attempt.record_failure(now, &POLICY);

        // Third failure lands after the window expired: counter restarts
        let later = now + 601;
        assert!(!attempt.record_failure(later, &POLICY));
        assert_eq!(attempt.failures, 1);
        assert_eq!(attempt.window_reset_at, later + 600);
        assert!(attempt.check(later).is_ok());
    }
}
