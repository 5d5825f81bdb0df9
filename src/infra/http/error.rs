use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use murmur_api_types::{ApiErrorBody, ApiErrorMessage, codes};

use crate::application::backend::BackendError;
use crate::application::error::ErrorReport;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Viewer header required",
            Some(format!("send the `{}` header", murmur_api_types::VIEWER_HEADER)),
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        let cause = err.clone();
        let mut api = match err {
            BackendError::NotFound => Self::not_found("Resource not found"),
            BackendError::Unauthorized => Self::unauthorized(),
            BackendError::InvalidInput { message } => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message),
            ),
            BackendError::Pagination(err) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_CURSOR,
                "Invalid cursor",
                Some(err.to_string()),
            ),
            BackendError::Unavailable(detail)
            | BackendError::Transport(detail)
            | BackendError::Protocol(detail) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::UNAVAILABLE,
                "Backend unavailable",
                Some(detail),
            ),
        };
        api.report = Some(ErrorReport::from_error("infra::memory", api.status, &cause));
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.clone().unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // Picked up by `log_responses`.
        report.attach(&mut response);
        response
    }
}
