use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mdpress_api_types::ErrorEnvelope;

use crate::application::convert::ConvertError;
use crate::application::error::ErrorReport;
use crate::domain::error::DomainError;

const SOURCE: &str = "infra::http::api";

/// Failure returned by the conversion endpoints as `{success: false, error}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, None)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, None)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Conversion failed",
            Some(detail.into()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Domain(DomainError::MissingMarkdown) => {
                Self::bad_request("markdown is required")
            }
            ConvertError::Domain(DomainError::UnknownTemplate { id }) => Self::new(
                StatusCode::BAD_REQUEST,
                "Template not found",
                Some(format!("unknown template `{id}`")),
            ),
            ConvertError::Domain(err @ DomainError::Validation { .. }) => {
                Self::bad_request(err.to_string())
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let (status, message) = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
        } else {
            (StatusCode::BAD_REQUEST, "Invalid request body")
        };
        Self::new(status, message, Some(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from_message(
            SOURCE,
            self.status,
            self.detail.as_deref().unwrap_or(&self.message),
        );
        let mut response = (self.status, Json(ErrorEnvelope::new(self.message))).into_response();
        report.attach(&mut response);
        response
    }
}
