//! User and account route handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use maxima_core::{Email, UserId};

use super::{jpeg, message};
use crate::error::{AppError, Result};
use crate::models::{Profile, RegisteredUser, User, UserUpdate, non_blank};
use crate::services::AccountError;
use crate::services::auth::{Registration, hash_password};
use crate::state::AppState;

/// Registration request body.
///
/// Field aliases accept the names used by the existing front end.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(alias = "nombreUsuario")]
    pub name: Option<String>,
    #[serde(alias = "apellidosUsuario")]
    pub surname: Option<String>,
    #[serde(alias = "fchNacUsu")]
    pub birth_date: Option<NaiveDate>,
    #[serde(alias = "movil")]
    pub phone: Option<String>,
    #[serde(default, alias = "correoElectronico")]
    pub email: String,
    #[serde(default, alias = "contrasena")]
    pub password: String,
    #[serde(default, alias = "tipoUsuario")]
    pub role: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "correoElectronico")]
    pub email: String,
    #[serde(default, alias = "contrasena")]
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Password reset request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default, alias = "tokenRecuperacion")]
    pub recovery_token: String,
    #[serde(default, alias = "nuevaContrasenia")]
    pub new_password: String,
}

/// Partial profile update body. Blank strings are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(alias = "nombreUsuario")]
    pub name: Option<String>,
    #[serde(alias = "apellidosUsuario")]
    pub surname: Option<String>,
    #[serde(alias = "fchNacUsu")]
    pub birth_date: Option<NaiveDate>,
    #[serde(alias = "movil")]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActivationQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryQuery {
    #[serde(rename = "correoElectronico", alias = "email")]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct DetailsQuery {
    #[serde(alias = "correoElectronico")]
    pub email: String,
}

/// POST /users/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>)> {
    let password_hash = hash_password(&body.password)?;

    let registration = Registration {
        profile: Profile {
            name: non_blank(body.name.as_deref()),
            surname: non_blank(body.surname.as_deref()),
            birth_date: body.birth_date,
            phone: non_blank(body.phone.as_deref()),
        },
        email: body.email,
        role: body.role,
        password_hash,
    };

    let registered = state.accounts().register(registration, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// PUT /users/activate?token=
pub async fn activate(
    State(state): State<AppState>,
    Query(query): Query<ActivationQuery>,
) -> Result<Json<Value>> {
    state.accounts().activate(&query.token, Utc::now()).await?;
    Ok(message("account activated"))
}

/// POST /users/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let token = state
        .accounts()
        .login(&body.email, &body.password, Utc::now())
        .await?;
    Ok(Json(LoginResponse { token }))
}

/// POST /users/recover?correoElectronico=
pub async fn request_recovery(
    State(state): State<AppState>,
    Query(query): Query<RecoveryQuery>,
) -> Result<Json<Value>> {
    state
        .accounts()
        .request_recovery(&query.email, Utc::now())
        .await?;
    Ok(message("recovery token issued"))
}

/// GET /users/recovery-token?correoElectronico=
///
/// Returns the raw outstanding token as plain text.
pub async fn recovery_token(
    State(state): State<AppState>,
    Query(query): Query<RecoveryQuery>,
) -> Result<String> {
    Ok(state.accounts().recovery_token(&query.email).await?)
}

/// PUT /users/reset-password
///
/// Unknown, spent and expired tokens are all reported as 400.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    state
        .accounts()
        .reset_password(&body.recovery_token, &body.new_password, Utc::now())
        .await
        .map_err(|e| match e {
            AccountError::TokenNotFound | AccountError::TokenExpired => {
                AppError::BadRequest("invalid or expired token".to_owned())
            }
            other => other.into(),
        })?;
    Ok(message("password updated"))
}

/// GET /users
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    Ok(Json(state.stores().accounts.list_users().await?))
}

/// GET /users/{id}
pub async fn show(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<Json<User>> {
    state
        .stores()
        .accounts
        .user_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

/// GET /users/details?email=
pub async fn details(
    State(state): State<AppState>,
    Query(query): Query<DetailsQuery>,
) -> Result<Json<User>> {
    let email = Email::parse(&query.email).map_err(AccountError::from)?;
    state
        .stores()
        .accounts
        .user_by_email(&email)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("user".to_owned()))
}

/// PUT /users/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    let update = UserUpdate::from_input(
        body.name.as_deref(),
        body.surname.as_deref(),
        body.birth_date,
        body.phone.as_deref(),
    );

    state
        .stores()
        .accounts
        .update_profile(id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

/// DELETE /users/{id}
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Value>> {
    if !state.stores().accounts.delete_user(id).await? {
        return Err(AppError::NotFound(format!("user {id}")));
    }
    tracing::info!(user_id = %id, "User deleted");
    Ok(message("user deleted"))
}

/// GET /users/{id}/photo
pub async fn photo(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<Response> {
    state
        .stores()
        .accounts
        .user_photo(id)
        .await?
        .map(jpeg)
        .ok_or_else(|| AppError::NotFound(format!("photo of user {id}")))
}

/// PUT /users/{id}/photo
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    body: Bytes,
) -> Result<StatusCode> {
    if body.is_empty() {
        return Err(AppError::BadRequest("photo is empty".to_owned()));
    }
    if !state.stores().accounts.set_user_photo(id, body.to_vec()).await? {
        return Err(AppError::NotFound(format!("user {id}")));
    }
    Ok(StatusCode::OK)
}
