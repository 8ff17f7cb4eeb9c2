//! Activation and recovery token lifecycles.
//!
//! Both tokens are random UUID strings stored on the user row. They differ in
//! how liveness is recorded:
//!
//! - activation stores an absolute expiry and is live while `expiry >= now`
//! - recovery stores the issue time and is live while `issued_at >= now - ttl`
//!
//! A missing timestamp always counts as expired.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// The token is past its lifetime, or its timestamp is missing.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("token has expired")]
pub struct TokenExpired;

/// Generate a fresh single-use token.
#[must_use]
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

/// Configured token lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub activation: Duration,
    pub recovery: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            activation: Duration::hours(24),
            recovery: Duration::hours(1),
        }
    }
}

/// A freshly issued activation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationTicket {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl ActivationTicket {
    #[must_use]
    pub fn issue(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token: generate_token(),
            expires_at: now + ttl,
        }
    }

    /// Check a stored expiry against `now`. The boundary instant is still live.
    ///
    /// # Errors
    ///
    /// Returns [`TokenExpired`] if `expires_at` is missing or before `now`.
    pub fn ensure_live(
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), TokenExpired> {
        match expires_at {
            Some(expiry) if expiry >= now => Ok(()),
            _ => Err(TokenExpired),
        }
    }
}

/// A freshly issued recovery token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryTicket {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl RecoveryTicket {
    #[must_use]
    pub fn issue(now: DateTime<Utc>) -> Self {
        Self {
            token: generate_token(),
            issued_at: now,
        }
    }

    /// Earliest issue time that is still live at `now`.
    #[must_use]
    pub fn cutoff(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        now - ttl
    }

    /// Check a stored issue time against `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenExpired`] if `issued_at` is missing or older than `ttl`.
    pub fn ensure_live(
        issued_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), TokenExpired> {
        match issued_at {
            Some(issued) if issued >= Self::cutoff(now, ttl) => Ok(()),
            _ => Err(TokenExpired),
        }
    }
}
