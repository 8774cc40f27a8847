use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use giftlink_shared::AuthError;

use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Authorization required")]
    Unauthorized,

    #[error("Invalid init data: {0}")]
    Forbidden(#[from] AuthError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for ServerError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(_) | ServiceError::SelfInvitation => {
                ServerError::BadRequest(err.to_string())
            }
            ServiceError::UnknownInviter(_) => ServerError::NotFound(err.to_string()),
            ServiceError::Store(_) | ServiceError::Internal(_) => {
                ServerError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
