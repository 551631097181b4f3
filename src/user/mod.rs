//! Users and their postal addresses.
//!
//! - [`models`]: entity definitions for the `users` and `user_addresses` tables
//! - [`schemas`]: request and response shapes
//! - [`repository`]: [`UserRepository`], the generic repository plus lookup by email
//! - [`service`]: [`UserService`], password hashing and credential checks
//! - [`auth`]: [`TokenIssuer`], access and refresh JWTs

pub mod auth;
pub mod models;
pub mod repository;
pub mod schemas;
pub mod service;

pub use auth::{Claims, TokenError, TokenIssuer};
pub use repository::{UserRepository, UserResource};
pub use service::{UserService, UserServiceError};

/// Raised when creating a user whose email is already registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Email {email} already exists")]
pub struct UserEmailExistsError {
    pub email: String,
}

impl UserEmailExistsError {
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: email.into() }
    }
}
