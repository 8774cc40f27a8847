//! Launch-data authentication for the HTTP API.
//!
//! Protected handlers take an [`AuthUser`] argument. The `Authorization`
//! header must carry the raw launch-data query string handed to the Mini
//! App, optionally prefixed with `tma `.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use giftlink_shared::{AuthError, UserClaims};

use crate::api::AppState;
use crate::error::ServerError;

const SCHEME_PREFIX: &str = "tma ";

/// The verified caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserClaims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(ServerError::Unauthorized)?;
        let raw = header
            .to_str()
            .map_err(|_| ServerError::Forbidden(AuthError::MalformedHeader))?
            .trim();
        if raw.is_empty() {
            return Err(ServerError::Unauthorized);
        }

        let raw = raw.strip_prefix(SCHEME_PREFIX).unwrap_or(raw);

        let launch = state.verifier.verify(raw).map_err(|e| {
            tracing::debug!(error = %e, "Launch data rejected");
            ServerError::Forbidden(e)
        })?;

        Ok(AuthUser(launch.user))
    }
}
