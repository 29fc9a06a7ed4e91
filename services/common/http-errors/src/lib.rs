use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use uuid::Uuid;

/// Uniform JSON error envelope; `code` is mirrored into the `X-Error-Code` header.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub missing_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    ForbiddenMissingRole { role: String, trace_id: Option<Uuid>, message: Option<String> },
    Conflict { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self { Self::Internal { trace_id, message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, trace_id: None, message: Some(message.into()) } }
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self { Self::NotFound { code, trace_id: None, message: Some(message.into()) } }
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self { Self::Conflict { code, trace_id: None, message: Some(message.into()) } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ForbiddenMissingRole { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::ForbiddenMissingRole { role, trace_id, message } =>
                ErrorBody { code: "missing_role".into(), missing_role: Some(role), trace_id, message },
            ApiError::BadRequest { code, trace_id, message } =>
                ErrorBody { code: code.into(), missing_role: None, trace_id, message },
            ApiError::NotFound { code, trace_id, message } | ApiError::Conflict { code, trace_id, message } =>
                ErrorBody { code: code.into(), missing_role: None, trace_id, message },
            ApiError::Internal { trace_id, message } =>
                ErrorBody { code: "internal_error".into(), missing_role: None, trace_id, message },
        };
        let header = HeaderValue::from_str(&body.code).ok();
        let mut resp = (status, Json(body)).into_response();
        if let Some(val) = header {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
