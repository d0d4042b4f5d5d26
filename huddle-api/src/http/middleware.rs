// HTTP middleware

use axum::{
    extract::{FromRef, FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use huddle_core::models::{User, UserId};
use serde::Deserialize;

use super::{AppError, AppState};

/// Authenticated user extracted from JWT token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub const fn user_id(&self) -> &UserId {
        &self.user.id
    }
}

/// Browsers cannot set headers on a WebSocket handshake, so the token may
/// also arrive as `?token=`
#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let user_id = match parts.headers.get(AUTHORIZATION) {
            Some(auth_header) => {
                let auth_str = auth_header.to_str().map_err(|e| {
                    AppError::unauthorized(format!("Invalid Authorization header: {e}"))
                })?;
                app_state
                    .jwt_validator
                    .validate_http(auth_str)
                    .map_err(|e| AppError::unauthorized(format!("{e}")))?
            }
            None => {
                let token = Query::<TokenQuery>::try_from_uri(&parts.uri)
                    .ok()
                    .and_then(|Query(query)| query.token)
                    .filter(|token| !token.is_empty())
                    .ok_or_else(|| AppError::unauthorized("Missing authentication token"))?;
                app_state
                    .jwt_validator
                    .validate_and_extract_user_id(&token)
                    .map_err(|e| AppError::unauthorized(format!("{e}")))?
            }
        };

        // A valid token for a deleted account is still rejected
        let user = app_state
            .store
            .get_user(&user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("User not found"))?;

        Ok(Self { user })
    }
}
