//! Order route handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use maxima_core::cart::RawCart;
use maxima_core::order::Order;
use maxima_core::{OrderId, OrderLineId, OrderStatus, UserId};

use super::message;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(alias = "status")]
    pub estado: String,
}

/// Read a cart body. A missing or `null` body is an empty cart, which the
/// workflow rejects like any other empty cart.
fn cart_from_body(body: &[u8]) -> Result<RawCart> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RawCart::new());
    }

    let cart: Option<RawCart> = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid cart: {e}")))?;
    Ok(cart.unwrap_or_default())
}

/// POST /orders/{userId}
///
/// The body maps product IDs (as strings) to quantities.
pub async fn create(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    body: Bytes,
) -> Result<Json<Order>> {
    let cart = cart_from_body(&body)?;
    add_breadcrumb(
        "orders",
        "Placing order",
        &[
            ("user_id", user_id.to_string()),
            ("items", cart.len().to_string()),
        ],
    );

    let order = state
        .orders()
        .create_order(user_id, &cart, Utc::now())
        .await?;
    Ok(Json(order))
}

/// GET /orders
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_all().await?))
}

/// GET /orders/user/{userId}
pub async fn for_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_for_user(user_id).await?))
}

/// GET /orders/{id}
pub async fn show(State(state): State<AppState>, Path(id): Path<OrderId>) -> Result<Json<Order>> {
    Ok(Json(state.orders().get(id).await?))
}

/// PUT /orders/{id}/status?estado=
pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Order>> {
    let next: OrderStatus = query.estado.parse().map_err(AppError::BadRequest)?;

    add_breadcrumb(
        "orders",
        "Changing order status",
        &[("order_id", id.to_string()), ("status", next.to_string())],
    );

    let order = state.orders().change_status(id, next, Utc::now()).await?;
    Ok(Json(order))
}

/// DELETE /orders/{id}
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Value>> {
    state.orders().delete(id).await?;
    Ok(message("order deleted"))
}

/// DELETE /orders/{id}/lines/{lineId}
pub async fn remove_line(
    State(state): State<AppState>,
    Path((id, line_id)): Path<(OrderId, OrderLineId)>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().remove_line(id, line_id).await?))
}
