//! JSON response bodies and error mapping for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::ServiceError;

/// Body carrying only a message.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body for successful calls that return data.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub data: T,
    pub message: &'static str,
}

#[derive(Serialize)]
struct ValidationBody {
    message: &'static str,
    errors: Vec<String>,
}

/// Errors returned by handlers and middleware.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(Vec<String>),
    Unauthorized,
    TooManyRequests(&'static str),
    /// The counter store is down and the service fails closed
    Unavailable,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(Message::new(message))).into_response()
            }
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(ValidationBody {
                    message: "invalid input",
                    errors,
                }),
            )
                .into_response(),
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(Message::new("unauthorized"))).into_response()
            }
            ApiError::TooManyRequests(reason) => {
                (StatusCode::TOO_MANY_REQUESTS, Json(Message::new(reason))).into_response()
            }
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Message::new("service unavailable")),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                // Log the real error server-side, return generic message to client
                tracing::error!(error = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(Message::new("internal server error")),
                )
                    .into_response()
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::InvalidCredentials => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
