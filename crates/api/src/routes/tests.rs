//! Router tests over the in-memory store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_http::cors::CorsLayer;

use maxima_core::UserId;
use maxima_core::account::TokenLifetimes;

use crate::db::{MemoryStore, Stores};
use crate::services::TokenIssuer;
use crate::state::AppState;

struct TestApp {
    memory: MemoryStore,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let memory = MemoryStore::new();
        let issuer = TokenIssuer::new(
            &SecretString::from("k7Qz!pL2#vX9@mN4$rT6^wY8&bH1*cJ3".to_owned()),
            Duration::hours(1),
        );
        let state = AppState::with_stores(
            Stores::memory(&memory),
            issuer,
            TokenLifetimes::default(),
        );
        Self {
            memory,
            router: crate::app(state, CorsLayer::new()),
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    async fn register(&self, email: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/users/register",
                Some(json!({
                    "name": "Lucía",
                    "surname": "García",
                    "email": email,
                    "password": "contraseña-segura",
                    "role": "cliente",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    async fn product(&self, name: &str, price: &str) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/products",
                Some(json!({ "name": name, "price": price, "stock": 100 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));

    let (status, _) = app.call(Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let app = TestApp::new();

    let request = Request::get("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let request = Request::get("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"].len(), 36);
}

#[tokio::test]
async fn test_register_returns_token_but_never_hash() {
    let app = TestApp::new();
    let body = app.register("lucia@maximacarga.es").await;

    assert_eq!(body["email"], "lucia@maximacarga.es");
    assert_eq!(body["active"], false);
    assert!(body["activationToken"].is_string());
    assert!(body["activationExpiresAt"].is_string());
    assert!(body.get("passwordHash").is_none());

    let id = body["id"].as_i64().unwrap();
    let (status, user) = app.call(Method::GET, &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(user.get("activationToken").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new();
    app.register("lucia@maximacarga.es").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/users/register",
            Some(json!({
                "correoElectronico": "lucia@maximacarga.es",
                "contrasena": "otra",
                "tipoUsuario": "cliente",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_activation_statuses() {
    let app = TestApp::new();
    let first = app.register("a@maximacarga.es").await;
    let second = app.register("b@maximacarga.es").await;

    let token = first["activationToken"].as_str().unwrap();
    let (status, _) = app
        .call(Method::PUT, &format!("/users/activate?token={token}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(Method::PUT, &format!("/users/activate?token={token}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let second_id = UserId::new(second["id"].as_i64().unwrap());
    app.memory
        .set_activation_expiry(second_id, Some(Utc::now() - Duration::minutes(1)))
        .await;
    let token = second["activationToken"].as_str().unwrap();
    let (status, _) = app
        .call(Method::PUT, &format!("/users/activate?token={token}"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login() {
    let app = TestApp::new();
    app.register("lucia@maximacarga.es").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/users/login",
            Some(json!({ "email": "lucia@maximacarga.es", "password": "contraseña-segura" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, body) = app
        .call(
            Method::POST,
            "/users/login",
            Some(json!({ "email": "lucia@maximacarga.es", "password": "mal" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "invalid credentials" }));
}

#[tokio::test]
async fn test_recovery_round_trip() {
    let app = TestApp::new();
    app.register("lucia@maximacarga.es").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/users/recover?correoElectronico=nadie@maximacarga.es",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::GET,
            "/users/recovery-token?correoElectronico=lucia@maximacarga.es",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::POST,
            "/users/recover?correoElectronico=lucia@maximacarga.es",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, token) = app
        .call(
            Method::GET,
            "/users/recovery-token?correoElectronico=lucia@maximacarga.es",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = token.as_str().unwrap().to_owned();

    let reset = json!({ "recoveryToken": token, "newPassword": "nueva-clave" });
    let (status, _) = app
        .call(Method::PUT, "/users/reset-password", Some(reset.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(Method::PUT, "/users/reset-password", Some(reset))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/users/login",
            Some(json!({ "email": "lucia@maximacarga.es", "password": "nueva-clave" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reset_with_expired_token_is_bad_request() {
    let app = TestApp::new();
    let user = app.register("lucia@maximacarga.es").await;
    app.call(
        Method::POST,
        "/users/recover?correoElectronico=lucia@maximacarga.es",
        None,
    )
    .await;
    let (_, token) = app
        .call(
            Method::GET,
            "/users/recovery-token?correoElectronico=lucia@maximacarga.es",
            None,
        )
        .await;

    let id = UserId::new(user["id"].as_i64().unwrap());
    app.memory
        .set_recovery_issued_at(id, Some(Utc::now() - Duration::hours(2)))
        .await;

    let (status, _) = app
        .call(
            Method::PUT,
            "/users/reset-password",
            Some(json!({ "tokenRecuperacion": token, "nuevaContrasenia": "nueva" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_profile_update_and_photo() {
    let app = TestApp::new();
    let user = app.register("lucia@maximacarga.es").await;
    let id = user["id"].as_i64().unwrap();

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/users/{id}"),
            Some(json!({ "name": "  Lucía María ", "surname": "   ", "phone": "600111222" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Lucía María");
    assert_eq!(body["surname"], "García");
    assert_eq!(body["phone"], "600111222");

    let (status, body) = app
        .call(
            Method::GET,
            "/users/details?email=lucia@maximacarga.es",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, _) = app
        .call(Method::GET, &format!("/users/{id}/photo"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let upload = Request::put(format!("/users/{id}/photo"))
        .header(header::CONTENT_TYPE, "image/jpeg")
        .body(Body::from(vec![0xFF, 0xD8, 0xFF, 0xE0]))
        .unwrap();
    let (status, _) = app.send(upload).await;
    assert_eq!(status, StatusCode::OK);

    let download = Request::get(format!("/users/{id}/photo"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(download).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

    let (status, _) = app
        .call(Method::DELETE, &format!("/users/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(Method::GET, &format!("/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_validation_and_crud() {
    let app = TestApp::new();

    let (status, _) = app
        .call(
            Method::POST,
            "/products",
            Some(json!({ "name": "   ", "price": "1.00", "stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/products",
            Some(json!({ "name": "Caja", "price": "-1.00", "stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = app.product("Caja", "10.00").await;
    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/products/{id}"),
            Some(json!({ "name": "Caja grande", "price": "12.50", "stock": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Caja grande");
    assert_eq!(body["price"], "12.50");

    let (status, list) = app.call(Method::GET, "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(Method::DELETE, &format!("/products/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(Method::DELETE, &format!("/products/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_lifecycle() {
    let app = TestApp::new();
    let user = app.register("lucia@maximacarga.es").await;
    let user_id = user["id"].as_i64().unwrap();
    let box_id = app.product("Caja", "10.00").await;
    let tape_id = app.product("Cinta", "3.50").await;

    let cart = json!({ box_id.to_string(): 2, tape_id.to_string(): 1 });
    let (status, order) = app
        .call(Method::POST, &format!("/orders/{user_id}"), Some(cart))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["total"], "23.50");
    assert_eq!(order["status"], "EN_PREPARACION");
    assert!(order["deliveredAt"].is_null());
    assert_eq!(order["lines"].as_array().unwrap().len(), 2);
    let order_id = order["id"].as_i64().unwrap();

    let (status, list) = app
        .call(Method::GET, &format!("/orders/user/{user_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/orders/{order_id}/status?estado=VOLANDO"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, delivered) = app
        .call(
            Method::PUT,
            &format!("/orders/{order_id}/status?estado=ENTREGADO"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "ENTREGADO");
    assert!(delivered["deliveredAt"].is_string());

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/orders/{order_id}/status?estado=CANCELADO"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let line_id = order["lines"][0]["id"].as_i64().unwrap();
    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/orders/{order_id}/lines/{line_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(Method::DELETE, &format!("/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call(Method::GET, &format!("/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_creation_failures() {
    let app = TestApp::new();
    let user = app.register("lucia@maximacarga.es").await;
    let user_id = user["id"].as_i64().unwrap();
    let box_id = app.product("Caja", "10.00").await;

    let (status, body) = app
        .call(Method::POST, &format!("/orders/{user_id}"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/orders/{user_id}"),
            Some(json!({ box_id.to_string(): 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/orders/{user_id}"),
            Some(json!({ box_id.to_string(): null })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/orders/{user_id}"),
            Some(json!({ box_id.to_string(): 1, "9999": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::POST,
            "/orders/4242",
            Some(json!({ box_id.to_string(): 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(app.memory.order_count().await, 0);
}

#[tokio::test]
async fn test_remove_line_while_preparing() {
    let app = TestApp::new();
    let user = app.register("lucia@maximacarga.es").await;
    let user_id = user["id"].as_i64().unwrap();
    let box_id = app.product("Caja", "10.00").await;
    let tape_id = app.product("Cinta", "3.50").await;

    let cart = json!({ box_id.to_string(): 2, tape_id.to_string(): 1 });
    let (_, order) = app
        .call(Method::POST, &format!("/orders/{user_id}"), Some(cart))
        .await;
    let order_id = order["id"].as_i64().unwrap();
    let line_id = order["lines"][1]["id"].as_i64().unwrap();

    let (status, updated) = app
        .call(
            Method::DELETE,
            &format!("/orders/{order_id}/lines/{line_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["total"], "20.00");
    assert_eq!(updated["lines"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/orders/{order_id}/lines/{line_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recovery_with_malformed_email_is_not_found() {
    let app = TestApp::new();

    let (status, body) = app
        .call(Method::POST, "/users/recover?correoElectronico=nadie", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call(
            Method::GET,
            "/users/recovery-token?correoElectronico=nadie",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_absent_or_malformed_cart_is_json_bad_request() {
    let app = TestApp::new();
    let user = app.register("lucia@maximacarga.es").await;
    let uri = format!("/orders/{}", user["id"].as_i64().unwrap());

    let (status, body) = app.call(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.call(Method::POST, &uri, Some(Value::Null)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app
        .call(Method::POST, &uri, Some(json!({ "5": "dos" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    assert_eq!(app.memory.order_count().await, 0);
}

#[tokio::test]
async fn test_prices_are_stored_in_cents() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            Method::POST,
            "/products",
            Some(json!({ "name": "Cinta", "price": "10.5", "stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["price"], "10.50");

    let (status, _) = app
        .call(
            Method::POST,
            "/products",
            Some(json!({ "name": "Cinta", "price": "10.005", "stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/products",
            Some(json!({ "name": "Palé", "price": "10000000000.00", "stock": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deletes_answer_with_message() {
    let app = TestApp::new();
    let user = app.register("lucia@maximacarga.es").await;
    let user_id = user["id"].as_i64().unwrap();
    let box_id = app.product("Caja", "10.00").await;

    let (_, order) = app
        .call(
            Method::POST,
            &format!("/orders/{user_id}"),
            Some(json!({ box_id.to_string(): 1 })),
        )
        .await;
    let order_id = order["id"].as_i64().unwrap();

    let (status, body) = app
        .call(Method::DELETE, &format!("/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "order deleted");

    let (status, body) = app
        .call(Method::DELETE, &format!("/products/{box_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "product deleted");

    let (status, body) = app
        .call(Method::DELETE, &format!("/users/{user_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "user deleted");
}
