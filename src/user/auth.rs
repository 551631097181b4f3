//! JWT issuing and verification.
//!
//! Access and refresh tokens are both HS256 tokens carrying the user's email
//! as `sub`, but they are signed with different secrets so a refresh token
//! never passes as an access token.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

use super::schemas::AccessTokenResponse;

pub const TOKEN_TYPE: &str = "bearer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User email.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("token has no subject")]
    MissingSubject,
}

#[derive(Clone)]
struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    fn sign(&self, email: &str, lifetime: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_string(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.sub.is_empty() {
            return Err(TokenError::MissingSubject);
        }
        Ok(data.claims)
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    access: Keys,
    refresh: Keys,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self {
            access: Keys::new(&cfg.jwt_secret),
            refresh: Keys::new(&cfg.jwt_refresh_secret),
            access_lifetime: Duration::minutes(cfg.access_token_expire_minutes),
            refresh_lifetime: Duration::minutes(cfg.refresh_token_expire_minutes),
        }
    }

    pub fn create_access_token(&self, email: &str) -> Result<String, TokenError> {
        self.access.sign(email, self.access_lifetime)
    }

    pub fn create_refresh_token(&self, email: &str) -> Result<String, TokenError> {
        self.refresh.sign(email, self.refresh_lifetime)
    }

    /// Fresh access and refresh tokens for `email`.
    pub fn issue(&self, email: &str) -> Result<AccessTokenResponse, TokenError> {
        Ok(AccessTokenResponse {
            access_token: self.create_access_token(email)?,
            refresh_token: self.create_refresh_token(email)?,
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.access.verify(token)
    }

    /// Verifies a refresh token and returns the email it was issued for.
    pub fn check_refresh_token(&self, token: &str) -> Result<String, TokenError> {
        Ok(self.refresh.verify(token)?.sub)
    }
}
