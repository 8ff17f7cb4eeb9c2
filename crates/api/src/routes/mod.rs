//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                       - Liveness
//! GET    /health/ready                 - Readiness (database ping)
//!
//! # Users
//! POST   /users/register               - Register (201, returns activation token)
//! PUT    /users/activate?token=        - Activate account
//! POST   /users/login                  - Issue bearer token
//! POST   /users/recover?correoElectronico=      - Issue recovery token
//! GET    /users/recovery-token?correoElectronico= - Read outstanding recovery token
//! PUT    /users/reset-password         - Reset password with recovery token
//! GET    /users                        - List users
//! GET    /users/details?email=         - User by email
//! GET    /users/{id}                   - User detail
//! PUT    /users/{id}                   - Partial profile update
//! DELETE /users/{id}                   - Delete user
//! GET    /users/{id}/photo             - Profile photo (image/jpeg)
//! PUT    /users/{id}/photo             - Upload profile photo
//!
//! # Products
//! POST   /products                     - Create product (201)
//! GET    /products                     - List products
//! GET    /products/{id}                - Product detail
//! PUT    /products/{id}                - Replace product fields
//! DELETE /products/{id}                - Delete product
//! GET    /products/{id}/image          - Product image (image/jpeg)
//! PUT    /products/{id}/image          - Upload product image
//!
//! # Orders
//! POST   /orders/{userId}              - Place order from cart
//! GET    /orders                       - List orders
//! GET    /orders/user/{userId}         - Orders of a user
//! GET    /orders/{id}                  - Order detail
//! PUT    /orders/{id}/status?estado=   - Change status
//! DELETE /orders/{id}                  - Delete order
//! DELETE /orders/{id}/lines/{lineId}   - Remove a line while in preparation
//! ```

pub mod orders;
pub mod products;
pub mod users;

#[cfg(test)]
mod tests;

use axum::{
    Json, Router,
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::state::AppState;

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::index))
        .route("/register", post(users::register))
        .route("/activate", put(users::activate))
        .route("/login", post(users::login))
        .route("/recover", post(users::request_recovery))
        .route("/recovery-token", get(users::recovery_token))
        .route("/reset-password", put(users::reset_password))
        .route("/details", get(users::details))
        .route(
            "/{id}",
            get(users::show).put(users::update).delete(users::destroy),
        )
        .route("/{id}/photo", get(users::photo).put(users::upload_photo))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::destroy),
        )
        .route(
            "/{id}/image",
            get(products::image).put(products::upload_image),
        )
}

/// Create the order routes router.
///
/// `POST /orders/{id}` takes a user ID while the other `/{id}` routes take
/// an order ID.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/user/{user_id}", get(orders::for_user))
        .route(
            "/{id}",
            post(orders::create)
                .get(orders::show)
                .delete(orders::destroy),
        )
        .route("/{id}/status", put(orders::change_status))
        .route("/{id}/lines/{line_id}", delete(orders::remove_line))
}

/// Create all resource routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
}

/// `{"message": text}` body for actions with nothing else to return.
fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

/// Respond with raw JPEG bytes.
fn jpeg(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()
}
