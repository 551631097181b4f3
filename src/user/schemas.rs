use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::validation::{validate_email, validate_min_length};
use crate::error::AppResult;
use crate::types::{Filter, ListFilter};

pub const PASSWORD_MIN_LENGTH: usize = 6;

pub type UserFilter = Filter;
pub type UserListFilter = ListFilter;

/// Address fields accepted on create and update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressView {
    pub id: i64,
    pub user_id: i64,
    pub city: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressInput>>,
}

impl UserCreate {
    pub fn validate(&self) -> AppResult<()> {
        validate_email(&self.email, "email")?;
        validate_min_length(&self.password, PASSWORD_MIN_LENGTH, "password")
    }
}

/// Partial update: only fields that are present are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AddressInput>>,
}

impl UserUpdate {
    pub fn validate(&self) -> AppResult<()> {
        match &self.password {
            Some(password) => validate_min_length(password, PASSWORD_MIN_LENGTH, "password"),
            None => Ok(()),
        }
    }
}

/// Public representation of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub addresses: Vec<AddressView>,
}

/// A user together with the stored password hash, for credential checks only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserUnprotectedView {
    #[serde(flatten)]
    pub user: UserView,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Form body of `POST /auth/authorize`; `username` carries the email.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}
