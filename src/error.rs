use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("A user with this email already exists")]
    UserAlreadyExists,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be between {min} and {max} characters")]
    InvalidPasswordLength { min: usize, max: usize },

    #[error("Missing or invalid session")]
    Unauthorized,

    #[error("Origin not allowed: {0}")]
    OriginRejected(String),

    #[error("Session cache error: {0}")]
    SessionCache(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            AppError::Database(_) | AppError::PasswordHash(_) | AppError::SessionCache(_) => {
                let body = ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            AppError::InvalidCredentials => {
                let body = ApiErrorBody {
                    code: "INVALID_EMAIL_OR_PASSWORD".to_string(),
                    message: "Invalid email or password.".to_string(),
                };
                (StatusCode::UNAUTHORIZED, body)
            }
            AppError::UserAlreadyExists => {
                let body = ApiErrorBody {
                    code: "USER_ALREADY_EXISTS".to_string(),
                    message: "A user with this email already exists.".to_string(),
                };
                (StatusCode::UNPROCESSABLE_ENTITY, body)
            }
            AppError::InvalidEmail => {
                let body = ApiErrorBody {
                    code: "INVALID_EMAIL".to_string(),
                    message: "The email address is not valid.".to_string(),
                };
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::InvalidPasswordLength { min, max } => {
                let body = ApiErrorBody {
                    code: "INVALID_PASSWORD_LENGTH".to_string(),
                    message: format!("Password must be between {min} and {max} characters."),
                };
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::Unauthorized => {
                let body = ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Missing or invalid session.".to_string(),
                };
                (StatusCode::UNAUTHORIZED, body)
            }
            AppError::OriginRejected(origin) => {
                let body = ApiErrorBody {
                    code: "CORS_REJECTED".to_string(),
                    message: format!("Origin {origin} is not allowed by the CORS policy."),
                };
                (StatusCode::FORBIDDEN, body)
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
