//! Caller authentication from the `authToken` header

use super::error::ApiError;
use super::state::AppState;
use crate::domain::auth::Caller;
use crate::domain::shared::DomainError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::debug;

/// `authToken`; header names are case-insensitive
pub const AUTH_HEADER: &str = "authtoken";

/// An authenticated caller; rejects with 401 when the token is missing or unknown
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedCaller(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTH_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                DomainError::Unauthorized("please authenticate using a valid token".to_string())
            })?;

        match state.authenticator.authenticate(token).await? {
            Some(caller) => {
                debug!("Authenticated caller {}", caller.customer_id);
                Ok(AuthenticatedCaller(caller))
            }
            None => Err(DomainError::Unauthorized("invalid auth token".to_string()).into()),
        }
    }
}
