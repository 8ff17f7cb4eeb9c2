//! Business logic services for the API.
//!
//! # Services
//!
//! - [`auth`] - Registration, login, activation and password recovery
//! - [`orders`] - Order placement and lifecycle
//!
//! Services borrow their stores from [`crate::db::Stores`] and take the
//! current time as an argument, so every rule can be tested against the
//! in-memory store with a fixed clock.

pub mod auth;
pub mod orders;

pub use auth::{AccountError, AccountService, TokenIssuer};
pub use orders::{OrderWorkflow, OrderWorkflowError};
