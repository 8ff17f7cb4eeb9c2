//! Maxima Carga Core - Domain types and rules.
//!
//! This crate provides the types and business rules shared by the HTTP
//! service and the CLI:
//! - `api` - JSON HTTP service over users, products and orders
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. Time is always passed in by the caller, which keeps every
//! rule deterministic under test.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, roles and order statuses
//! - [`cart`] - Client-supplied cart parsing
//! - [`order`] - The order aggregate and its status machine
//! - [`product`] - Catalog entry validation
//! - [`account`] - Activation and recovery token lifecycles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod cart;
pub mod order;
pub mod product;
pub mod types;

pub use types::*;
