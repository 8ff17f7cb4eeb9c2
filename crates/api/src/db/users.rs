//! User repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use maxima_core::account::RecoveryTicket;
use maxima_core::{Email, UserId, UserRole};

use super::{AccountStore, RepositoryError, TokenHolder, conflict_on_unique};
use crate::models::{NewUser, User, UserCredentials, UserUpdate};

/// Columns selected for every [`UserRow`].
const USER_COLUMNS: &str = r"
    id, name, surname, birth_date, phone, email, role, active,
    photo IS NOT NULL AS has_photo, created_at
";

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: Option<String>,
    surname: Option<String>,
    birth_date: Option<NaiveDate>,
    phone: Option<String>,
    email: String,
    role: String,
    active: bool,
    has_photo: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let role = UserRole::parse(&row.role).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid role in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            surname: row.surname,
            birth_date: row.birth_date,
            phone: row.phone,
            email,
            role,
            active: row.active,
            has_photo: row.has_photo,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TokenHolderRow {
    id: i64,
    stamped_at: Option<DateTime<Utc>>,
}

impl From<TokenHolderRow> for TokenHolder {
    fn from(row: TokenHolderRow) -> Self {
        Self {
            user_id: UserId::new(row.id),
            stamped_at: row.stamped_at,
        }
    }
}

/// Repository for user database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for UserRepository {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO shop.user (
                name, surname, birth_date, phone, email, role, password_hash,
                active, activation_token, activation_expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $9)
            RETURNING {USER_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new_user.profile.name)
            .bind(&new_user.profile.surname)
            .bind(new_user.profile.birth_date)
            .bind(&new_user.profile.phone)
            .bind(new_user.email.as_str())
            .bind(new_user.role.as_str())
            .bind(&new_user.password_hash)
            .bind(&new_user.activation.token)
            .bind(new_user.activation.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "user with this email"))?;

        row.try_into()
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM shop.user WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM shop.user WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn credentials_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM shop.user WHERE email = $1"
        );
        let row = sqlx::query_as::<_, CredentialsRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            Ok(UserCredentials {
                user: r.user.try_into()?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM shop.user ORDER BY id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            r"
            UPDATE shop.user
            SET name = COALESCE($2, name),
                surname = COALESCE($3, surname),
                birth_date = COALESCE($4, birth_date),
                phone = COALESCE($5, phone)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        );

        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.surname)
            .bind(update.birth_date)
            .bind(&update.phone)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.user WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn user_photo(&self, id: UserId) -> Result<Option<Vec<u8>>, RepositoryError> {
        let photo: Option<Option<Vec<u8>>> =
            sqlx::query_scalar("SELECT photo FROM shop.user WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(photo.flatten())
    }

    async fn set_user_photo(&self, id: UserId, photo: Vec<u8>) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE shop.user SET photo = $2 WHERE id = $1")
            .bind(id)
            .bind(photo)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn activation_holder(&self, token: &str) -> Result<Option<TokenHolder>, RepositoryError> {
        let row = sqlx::query_as::<_, TokenHolderRow>(
            r"
            SELECT id, activation_expires_at AS stamped_at
            FROM shop.user
            WHERE activation_token = $1
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TokenHolder::from))
    }

    async fn consume_activation(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserId>, RepositoryError> {
        let id: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE shop.user
            SET active = TRUE,
                activation_token = NULL,
                activation_expires_at = NULL
            WHERE activation_token = $1
              AND activation_expires_at >= $2
            RETURNING id
            ",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(UserId::new))
    }

    async fn issue_recovery(
        &self,
        email: &Email,
        ticket: &RecoveryTicket,
    ) -> Result<Option<UserId>, RepositoryError> {
        let id: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE shop.user
            SET recovery_token = $2,
                recovery_issued_at = $3
            WHERE email = $1
            RETURNING id
            ",
        )
        .bind(email.as_str())
        .bind(&ticket.token)
        .bind(ticket.issued_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(UserId::new))
    }

    async fn recovery_token(&self, email: &Email) -> Result<Option<String>, RepositoryError> {
        let token: Option<Option<String>> =
            sqlx::query_scalar("SELECT recovery_token FROM shop.user WHERE email = $1")
                .bind(email.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(token.flatten())
    }

    async fn recovery_holder(&self, token: &str) -> Result<Option<TokenHolder>, RepositoryError> {
        let row = sqlx::query_as::<_, TokenHolderRow>(
            r"
            SELECT id, recovery_issued_at AS stamped_at
            FROM shop.user
            WHERE recovery_token = $1
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TokenHolder::from))
    }

    async fn consume_recovery(
        &self,
        token: &str,
        not_before: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let id: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE shop.user
            SET password_hash = $3,
                recovery_token = NULL,
                recovery_issued_at = NULL
            WHERE recovery_token = $1
              AND recovery_issued_at >= $2
            RETURNING id
            ",
        )
        .bind(token)
        .bind(not_before)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(UserId::new))
    }
}
