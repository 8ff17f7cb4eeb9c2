//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Error bodies are JSON of the
//! form `{"error": "<message>"}`; server errors are captured to Sentry and
//! replaced by a generic message before they reach the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use maxima_core::order::OrderError;
use maxima_core::product::ProductError;

use crate::db::RepositoryError;
use crate::services::{AccountError, OrderWorkflowError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Account operation failed.
    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderWorkflowError),

    /// Product fields failed validation.
    #[error("Invalid product: {0}")]
    Product(#[from] ProductError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Account(err) => match err {
                AccountError::InvalidEmail(_)
                | AccountError::InvalidRole(_)
                | AccountError::EmptyPassword => StatusCode::BAD_REQUEST,
                AccountError::EmailTaken => StatusCode::CONFLICT,
                AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AccountError::UserNotFound | AccountError::TokenNotFound => StatusCode::NOT_FOUND,
                AccountError::TokenExpired => StatusCode::FORBIDDEN,
                AccountError::Repository(err) => repository_status(err),
                AccountError::PasswordHash | AccountError::Signing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Order(err) => match err {
                OrderWorkflowError::Cart(_) => StatusCode::BAD_REQUEST,
                OrderWorkflowError::Order(err) => match err {
                    OrderError::InvalidQuantity(_)
                    | OrderError::NegativePrice
                    | OrderError::Overflow => StatusCode::BAD_REQUEST,
                    OrderError::NoSuchLine(_) => StatusCode::NOT_FOUND,
                    OrderError::NoLines
                    | OrderError::AlreadyFinalized(_)
                    | OrderError::LinesLocked(_) => StatusCode::CONFLICT,
                },
                OrderWorkflowError::UserNotFound(_)
                | OrderWorkflowError::ProductNotFound(_)
                | OrderWorkflowError::OrderNotFound(_)
                | OrderWorkflowError::LineNotFound { .. } => StatusCode::NOT_FOUND,
                OrderWorkflowError::ConcurrentUpdate(_) => StatusCode::CONFLICT,
                OrderWorkflowError::Repository(err) => repository_status(err),
            },
            Self::Product(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self, status: StatusCode) -> String {
        // Don't expose internal error details to clients
        if status.is_server_error() {
            return "internal server error".to_owned();
        }

        match self {
            Self::Database(err)
            | Self::Account(AccountError::Repository(err))
            | Self::Order(OrderWorkflowError::Repository(err)) => err.to_string(),
            Self::Account(err) => err.to_string(),
            Self::Order(err) => err.to_string(),
            Self::Product(err) => err.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) | Self::Internal(msg) => msg.clone(),
        }
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.client_message(status);
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a state-changing request.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_owned()),
        message: Some(message.to_owned()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_owned(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use maxima_core::cart::CartError;
    use maxima_core::{OrderId, OrderStatus};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_of(err: AppError) -> serde_json::Value {
        let bytes = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 123".to_owned());
        assert_eq!(err.to_string(), "Not found: product 123");

        let err = AppError::BadRequest("invalid input".to_owned());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_account_status_codes() {
        assert_eq!(
            get_status(AccountError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AccountError::EmailTaken.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AccountError::TokenNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AccountError::TokenExpired.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AccountError::PasswordHash.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_order_status_codes() {
        assert_eq!(
            get_status(OrderWorkflowError::Cart(CartError::Empty).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(OrderWorkflowError::OrderNotFound(OrderId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(
                OrderWorkflowError::Order(OrderError::AlreadyFinalized(OrderStatus::Cancelado))
                    .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(OrderWorkflowError::ConcurrentUpdate(OrderId::new(1)).into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_repository_status_codes() {
        assert_eq!(
            get_status(RepositoryError::Conflict("email".to_owned()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad row".to_owned()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let body = body_of(AccountError::InvalidCredentials.into()).await;
        assert_eq!(body, json!({ "error": "invalid credentials" }));
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let body = body_of(RepositoryError::DataCorruption("order 7: bad status".to_owned()).into())
            .await;
        assert_eq!(body, json!({ "error": "internal server error" }));
    }
}
