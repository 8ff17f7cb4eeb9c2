//! Integration tests for Maxima Carga.
//!
//! These tests drive a running API server over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! # Apply migrations and start the server
//! cargo run -p maxima-cli -- migrate
//! cargo run -p maxima-api
//!
//! # Run the ignored integration tests
//! cargo test -p maxima-integration-tests -- --ignored
//! ```
//!
//! `MAXIMA_BASE_URL` points the tests at another server
//! (default: `http://localhost:8080`).

use reqwest::Client;
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL of the API under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("MAXIMA_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_owned())
}

/// An HTTP client plus the base URL it talks to.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: base_url(),
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Register a throwaway user and return the response body.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the request fails.
    pub async fn register(&self, email: &str, password: &str) -> Result<Value, reqwest::Error> {
        self.client
            .post(self.url("/users/register"))
            .json(&json!({
                "name": "Prueba",
                "email": email,
                "password": password,
                "role": "cliente",
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Create a product and return its ID.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the request fails.
    pub async fn create_product(&self, name: &str, price: &str) -> Result<i64, reqwest::Error> {
        let body: Value = self
            .client
            .post(self.url("/products"))
            .json(&json!({ "name": name, "price": price, "stock": 10 }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body["id"].as_i64().unwrap_or_default())
    }
}

/// A unique email address so reruns never collide.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@maximacarga.test", Uuid::new_v4().simple())
}
