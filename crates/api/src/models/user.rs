//! User account models.

use chrono::{DateTime, NaiveDate, Utc};
use maxima_core::account::ActivationTicket;
use maxima_core::{Email, UserId, UserRole};
use serde::Serialize;

/// A user account as exposed to clients.
///
/// Never carries the password hash or any token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Given name.
    pub name: Option<String>,
    /// Surname(s).
    pub surname: Option<String>,
    /// Date of birth.
    pub birth_date: Option<NaiveDate>,
    /// Phone number.
    pub phone: Option<String>,
    /// Login email, unique.
    pub email: Email,
    /// Free-form role tag.
    pub role: UserRole,
    /// Whether the account has been activated.
    pub active: bool,
    /// Whether a profile photo is stored.
    pub has_photo: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Profile fields supplied at registration.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
}

/// Everything needed to insert a new, inactive user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub profile: Profile,
    pub email: Email,
    pub role: UserRole,
    pub password_hash: String,
    pub activation: ActivationTicket,
}

/// Response body for a successful registration.
///
/// The activation token is returned so the caller can relay it to the user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    #[serde(flatten)]
    pub user: User,
    pub activation_token: String,
    pub activation_expires_at: DateTime<Utc>,
}

/// Partial profile update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
}

impl UserUpdate {
    /// Build an update from raw client input: text is trimmed and blank
    /// values are ignored.
    #[must_use]
    pub fn from_input(
        name: Option<&str>,
        surname: Option<&str>,
        birth_date: Option<NaiveDate>,
        phone: Option<&str>,
    ) -> Self {
        Self {
            name: non_blank(name),
            surname: non_blank(surname),
            birth_date,
            phone: non_blank(phone),
        }
    }

    /// Returns true if the update would not change anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.surname.is_none()
            && self.birth_date.is_none()
            && self.phone.is_none()
    }
}

/// A user together with the stored password hash, for login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Trim a value and drop it if nothing remains.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
