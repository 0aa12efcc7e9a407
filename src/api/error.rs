//! HTTP mapping of domain errors and the extractors that reject through it.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::{DomainError, FieldErrors};

pub const GENERIC_ERROR: &str = "An unexpected error occurred";

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl DomainError {
    pub fn status(&self) -> StatusCode {
        match self {
            DomainError::NotFound => StatusCode::NOT_FOUND,
            DomainError::Validation(_) | DomainError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DomainError::Unauthorized => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::External(_) => StatusCode::BAD_GATEWAY,
            DomainError::Database(_) | DomainError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            DomainError::Database(_) | DomainError::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                GENERIC_ERROR.to_string()
            }
            DomainError::External(detail) => {
                tracing::error!("Upstream failure: {}", detail);
                "Payment provider is unavailable".to_string()
            }
            other => other.to_string(),
        };
        let errors = match &self {
            DomainError::Validation(fields) => Some(fields),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            error,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for DomainError {
    fn from(rejection: JsonRejection) -> Self {
        DomainError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for DomainError {
    fn from(rejection: QueryRejection) -> Self {
        DomainError::BadRequest(rejection.body_text())
    }
}

/// `Json` whose rejection uses the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(DomainError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejection uses the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(DomainError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(DomainError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            DomainError::field("title", "bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(DomainError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(DomainError::forbidden().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            DomainError::External("down".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            DomainError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
