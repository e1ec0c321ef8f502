use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::payments::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("User with this email already exists")]
    DuplicateEmail,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("User does not have a Stripe account")]
    MissingStripeAccount,

    #[error("Missing origin header")]
    MissingOrigin,

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DuplicateEmail => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MissingStripeAccount => StatusCode::BAD_REQUEST,
            AppError::MissingOrigin => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        // Input problems are reported under "message", everything else under "error".
        let body = match &self {
            AppError::DuplicateEmail | AppError::Validation(_) | AppError::NotFound(_) => {
                serde_json::json!({ "message": self.to_string() })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::DuplicateEmail.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("User not found".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::MissingStripeAccount.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Gateway(GatewayError::network("connection reset")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_gateway_error_displays_raw_message() {
        let err = AppError::Gateway(GatewayError::network("No such price: 'price_x'"));
        assert_eq!(err.to_string(), "No such price: 'price_x'");
    }
}
