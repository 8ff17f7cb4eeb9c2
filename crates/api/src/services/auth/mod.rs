//! Account service.
//!
//! Registration, login, account activation and password recovery. Token
//! consumption goes through the store's conditional writes, so a token can
//! be spent at most once even under concurrent requests.

mod error;
pub mod password;
pub mod token;

pub use error::AccountError;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenIssuer};

use chrono::{DateTime, Utc};
use tracing::instrument;

use maxima_core::account::{ActivationTicket, RecoveryTicket, TokenLifetimes};
use maxima_core::{Email, UserId, UserRole};

use crate::db::{AccountStore, RepositoryError, Stores};
use crate::models::{NewUser, Profile, RegisteredUser};

/// Input for [`AccountService::register`]. The password is already hashed.
#[derive(Debug, Clone)]
pub struct Registration {
    pub profile: Profile,
    pub email: String,
    pub role: String,
    pub password_hash: String,
}

/// Account service.
pub struct AccountService<'a> {
    accounts: &'a dyn AccountStore,
    issuer: &'a TokenIssuer,
    lifetimes: TokenLifetimes,
}

impl<'a> AccountService<'a> {
    #[must_use]
    pub fn new(stores: &'a Stores, issuer: &'a TokenIssuer, lifetimes: TokenLifetimes) -> Self {
        Self {
            accounts: stores.accounts.as_ref(),
            issuer,
            lifetimes,
        }
    }

    /// Register a new, inactive user with a fresh activation token.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidEmail` / `AccountError::InvalidRole` for
    /// bad input and `AccountError::EmailTaken` if the email is registered.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        registration: Registration,
        now: DateTime<Utc>,
    ) -> Result<RegisteredUser, AccountError> {
        let email = Email::parse(&registration.email)?;
        let role = UserRole::parse(&registration.role)?;
        let activation = ActivationTicket::issue(now, self.lifetimes.activation);

        let user = self
            .accounts
            .insert_user(NewUser {
                profile: registration.profile,
                email,
                role,
                password_hash: registration.password_hash,
                activation: activation.clone(),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AccountError::EmailTaken,
                other => AccountError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(RegisteredUser {
            user,
            activation_token: activation.token,
            activation_expires_at: activation.expires_at,
        })
    }

    /// Activate the account holding `token`.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::TokenNotFound` if no user holds the token
    /// (including one already spent) and `AccountError::TokenExpired` if it
    /// is past its expiry.
    #[instrument(skip_all)]
    pub async fn activate(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AccountError> {
        let holder = self
            .accounts
            .activation_holder(token)
            .await?
            .ok_or(AccountError::TokenNotFound)?;

        ActivationTicket::ensure_live(holder.stamped_at, now)?;

        let user_id = self
            .accounts
            .consume_activation(token, now)
            .await?
            .ok_or(AccountError::TokenNotFound)?;

        tracing::info!(user_id = %user_id, "Account activated");
        Ok(user_id)
    }

    /// Check credentials and issue a bearer token.
    ///
    /// Unknown emails, malformed emails and wrong passwords all fail the
    /// same way.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidCredentials` on any mismatch.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AccountError> {
        let email = Email::parse(email).map_err(|_| AccountError::InvalidCredentials)?;

        let credentials = self
            .accounts
            .credentials_by_email(&email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        verify_password(password, &credentials.password_hash)?;

        let token = self.issuer.issue(&email, now)?;
        tracing::info!(user_id = %credentials.user.id, "User logged in");
        Ok(token)
    }

    /// Issue a recovery token for `email`, replacing any outstanding one.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::UserNotFound` if no user has that email,
    /// including when the address is not well-formed.
    #[instrument(skip_all)]
    pub async fn request_recovery(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let email = Email::parse(email).map_err(|_| AccountError::UserNotFound)?;
        let ticket = RecoveryTicket::issue(now);

        let user_id = self
            .accounts
            .issue_recovery(&email, &ticket)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        tracing::info!(user_id = %user_id, "Recovery token issued");
        Ok(())
    }

    /// The outstanding recovery token for `email`.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::UserNotFound` if no user has that email and
    /// `AccountError::TokenNotFound` if the user has no outstanding token.
    pub async fn recovery_token(&self, email: &str) -> Result<String, AccountError> {
        let email = Email::parse(email).map_err(|_| AccountError::UserNotFound)?;

        if self.accounts.user_by_email(&email).await?.is_none() {
            return Err(AccountError::UserNotFound);
        }

        self.accounts
            .recovery_token(&email)
            .await?
            .ok_or(AccountError::TokenNotFound)
    }

    /// Replace the password of the user holding `token` and spend the token.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::TokenNotFound` for an unknown or spent token,
    /// `AccountError::TokenExpired` if it was issued too long ago, and
    /// `AccountError::EmptyPassword` for an empty new password.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<UserId, AccountError> {
        let holder = self
            .accounts
            .recovery_holder(token)
            .await?
            .ok_or(AccountError::TokenNotFound)?;

        RecoveryTicket::ensure_live(holder.stamped_at, now, self.lifetimes.recovery)?;

        let password_hash = hash_password(new_password)?;
        let cutoff = RecoveryTicket::cutoff(now, self.lifetimes.recovery);

        let user_id = self
            .accounts
            .consume_recovery(token, cutoff, &password_hash)
            .await?
            .ok_or(AccountError::TokenNotFound)?;

        tracing::info!(user_id = %user_id, "Password reset");
        Ok(user_id)
    }
}
