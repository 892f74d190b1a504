use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures the gateway reports to its caller as a JSON envelope.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("API key not configured")]
    MissingCredential { hint: String },

    #[error("AI Gateway error: {status}")]
    Upstream { status: u16, details: String },

    #[error("Internal server error")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::MissingCredential { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        let body = match self {
            Self::MethodNotAllowed => json!({ "error": error }),
            Self::MissingCredential { hint } => json!({ "error": error, "hint": hint }),
            Self::Upstream { details, .. } | Self::Internal(details) => {
                json!({ "error": error, "details": details })
            }
        };
        (status, Json(body)).into_response()
    }
}
