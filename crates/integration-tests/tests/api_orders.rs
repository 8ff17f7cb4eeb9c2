//! Order workflow against a running server.
//!
//! Requires a migrated `PostgreSQL` database and `cargo run -p maxima-api`.

#![allow(clippy::indexing_slicing)]

use maxima_integration_tests::{TestContext, unique_email};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_order_is_priced_and_persisted() {
    let ctx = TestContext::new();
    let user = ctx.register(&unique_email(), "clave").await.unwrap();
    let user_id = user["id"].as_i64().unwrap();
    let caja = ctx.create_product("Caja IT", "10.00").await.unwrap();
    let cinta = ctx.create_product("Cinta IT", "3.50").await.unwrap();

    let resp = ctx
        .client
        .post(ctx.url(&format!("/orders/{user_id}")))
        .json(&json!({ caja.to_string(): 2, cinta.to_string(): 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["total"], "23.50");
    assert_eq!(order["status"], "EN_PREPARACION");
    let order_id = order["id"].as_i64().unwrap();

    let fetched: Value = ctx
        .client
        .get(ctx.url(&format!("/orders/{order_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["lines"].as_array().unwrap().len(), 2);

    let resp = ctx
        .client
        .put(ctx.url(&format!("/orders/{order_id}/status")))
        .query(&[("estado", "ENTREGADO")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let delivered: Value = resp.json().await.unwrap();
    assert!(delivered["deliveredAt"].is_string());

    let resp = ctx
        .client
        .put(ctx.url(&format!("/orders/{order_id}/status")))
        .query(&[("estado", "CANCELADO")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = ctx
        .client
        .delete(ctx.url(&format!("/orders/{order_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_unknown_product_creates_nothing() {
    let ctx = TestContext::new();
    let user = ctx.register(&unique_email(), "clave").await.unwrap();
    let user_id = user["id"].as_i64().unwrap();
    let caja = ctx.create_product("Caja IT", "10.00").await.unwrap();

    let resp = ctx
        .client
        .post(ctx.url(&format!("/orders/{user_id}")))
        .json(&json!({ caja.to_string(): 1, "999999999": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let orders: Value = ctx
        .client
        .get(ctx.url(&format!("/orders/user/{user_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(orders.as_array().unwrap().is_empty());
}
