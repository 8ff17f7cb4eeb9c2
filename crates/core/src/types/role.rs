//! User role tag.
//!
//! The role is a free-form tag chosen by the front end (`cliente`, `admin`,
//! ...). The backend stores it and never branches on it.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`UserRole`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UserRoleError {
    /// The role is blank.
    #[error("role cannot be blank")]
    Blank,
    /// The role does not fit the `role` column.
    #[error("role must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A non-blank role tag of at most 20 characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct UserRole(String);

impl UserRole {
    /// Maximum length of a role tag.
    pub const MAX_LENGTH: usize = 20;

    /// Parse a role tag, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`UserRoleError`] if the tag is blank or too long.
    pub fn parse(input: &str) -> Result<Self, UserRoleError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(UserRoleError::Blank);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(UserRoleError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserRole {
    type Error = UserRoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.0
    }
}
