//! Token extraction and validation shared by the HTTP extractors and the
//! WebSocket upgrade handlers

use super::{jwt::JwtService, Claims};
use crate::{models::UserId, Error, Result};
use std::sync::Arc;

/// JWT validator for HTTP authentication
#[derive(Clone)]
pub struct JwtValidator {
    jwt_service: Arc<JwtService>,
}

impl JwtValidator {
    #[must_use]
    pub const fn new(jwt_service: Arc<JwtService>) -> Self {
        Self { jwt_service }
    }

    /// Extract bearer token from Authorization header value
    ///
    /// Supports both "Bearer <token>" and "bearer <token>" formats.
    pub fn extract_bearer_token(auth_value: &str) -> Result<String> {
        auth_value
            .strip_prefix("Bearer ")
            .or_else(|| auth_value.strip_prefix("bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                Error::Authentication("Authorization header must start with 'Bearer '".to_string())
            })
    }

    /// Validate JWT token and return claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        self.jwt_service.verify_token(token)
    }

    /// Validate JWT token and return the user it was issued to
    pub fn validate_and_extract_user_id(&self, token: &str) -> Result<UserId> {
        Ok(self.validate_token(token)?.user_id())
    }

    /// Validate the value of an `Authorization` header
    pub fn validate_http(&self, auth_header: &str) -> Result<UserId> {
        let token = Self::extract_bearer_token(auth_header)?;
        self.validate_and_extract_user_id(&token)
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator").finish()
    }
}
