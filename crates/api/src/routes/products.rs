//! Catalog route handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use maxima_core::ProductId;
use maxima_core::product::{Product, ProductDraft};

use super::{jpeg, message};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create / replace request body.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    #[serde(alias = "nombre")]
    pub name: Option<String>,
    #[serde(alias = "descripcion")]
    pub description: Option<String>,
    #[serde(alias = "precio")]
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
}

impl ProductRequest {
    fn draft(&self) -> Result<ProductDraft> {
        Ok(ProductDraft::new(
            self.name.as_deref(),
            self.description.as_deref(),
            self.price,
            self.stock,
        )?)
    }
}

/// POST /products
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state
        .stores()
        .catalog
        .insert_product(&body.draft()?)
        .await?;
    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.stores().catalog.list_products().await?))
}

/// GET /products/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .stores()
        .catalog
        .product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// PUT /products/{id}
///
/// Replaces every editable field. Prices already copied into orders are not
/// affected.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Product>> {
    let draft = body.draft()?;
    let product = state
        .stores()
        .catalog
        .update_product(id, &draft)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    tracing::info!(product_id = %id, "Product updated");
    Ok(Json(product))
}

/// DELETE /products/{id}
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Value>> {
    if !state.stores().catalog.delete_product(id).await? {
        return Err(AppError::NotFound(format!("product {id}")));
    }
    tracing::info!(product_id = %id, "Product deleted");
    Ok(message("product deleted"))
}

/// GET /products/{id}/image
pub async fn image(State(state): State<AppState>, Path(id): Path<ProductId>) -> Result<Response> {
    state
        .stores()
        .catalog
        .product_image(id)
        .await?
        .map(jpeg)
        .ok_or_else(|| AppError::NotFound(format!("image of product {id}")))
}

/// PUT /products/{id}/image
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    body: Bytes,
) -> Result<StatusCode> {
    if body.is_empty() {
        return Err(AppError::BadRequest("image is empty".to_owned()));
    }
    if !state
        .stores()
        .catalog
        .set_product_image(id, body.to_vec())
        .await?
    {
        return Err(AppError::NotFound(format!("product {id}")));
    }
    Ok(StatusCode::OK)
}
