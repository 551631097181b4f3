//! # crudstack
//!
//! A generic asynchronous CRUD backend over SQLite, with a user and address
//! resource built on top of it.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: HTTP server, routing and request extraction
//! - **SQLx**: Asynchronous SQLite access and query building
//! - **Tokio**: Async runtime
//! - **Serde**: Mapping between transfer schemas and stored rows
//!
//! ## Core Components
//!
//! - [`entity`]: Entity metadata registry and in-memory instances
//! - [`repository`]: Filter builder, object mapper and the generic repository
//! - [`services`]: Service layer delegating to repositories
//! - [`user`]: Users, addresses, password hashing and tokens
//! - [`middleware`]: Bearer-token authentication extractor
//! - [`routes`]: HTTP API endpoint handlers
//! - [`config`]: Application configuration management
//! - [`db`]: Connection pool and schema initialization
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`state`]: Shared application state
//! - [`types`]: Filters and list envelopes

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
pub mod types;
pub mod user;

#[cfg(test)]
mod tests;
