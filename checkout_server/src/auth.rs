//! Bearer-token authentication for the demo storefront.
//!
//! There are exactly two identities, a guest and an administrator, each with fixed credentials and a fixed token
//! (see [`AuthConfig`]). `POST /api/login` exchanges credentials for the token; every other call presents it in an
//! `Authorization: Bearer <token>` header.
use std::fmt::Display;

use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, errors::AuthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Guest => write!(f, "guest"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Who made a request, as determined by the bearer token. Requests without a bearer token carry no `Caller` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Authenticated(Role),
    /// A bearer token was presented, but it does not belong to anyone.
    Unrecognised,
}

impl Caller {
    pub fn has_role(&self, role: Role) -> bool {
        matches!(self, Caller::Authenticated(r) if *r == role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

impl AuthConfig {
    /// Checks a username and password pair and returns the matching bearer token.
    pub fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let LoginRequest { username, password } = request;
        if *username == self.admin_username && password == self.admin_password.reveal() {
            debug!("💻️ Admin login");
            return Ok(LoginResponse { token: self.admin_token.reveal().clone(), role: Role::Admin });
        }
        if *username == self.guest_username && password == self.guest_password.reveal() {
            debug!("💻️ Guest login");
            return Ok(LoginResponse { token: self.guest_token.reveal().clone(), role: Role::Guest });
        }
        debug!("💻️ Login rejected for {username}");
        Err(AuthError::InvalidCredentials)
    }

    pub fn caller_for_token(&self, token: &str) -> Caller {
        if token == self.admin_token.reveal() {
            Caller::Authenticated(Role::Admin)
        } else if token == self.guest_token.reveal() {
            Caller::Authenticated(Role::Guest)
        } else {
            Caller::Unrecognised
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header. Any other form counts as no token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
