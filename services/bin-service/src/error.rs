use common_auth::GuardError;
use common_http_errors::ApiError;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

pub type CoreResult<T> = Result<T, CoreError>;

/// Failure taxonomy shared by every bin-service operation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller input violates a documented constraint; never retried.
    #[error("{message}")]
    Validation { field: &'static str, message: String },
    /// Authenticated, but the role is not allowed to perform the action.
    #[error("role '{role}' is not permitted; requires one of {required:?}")]
    Authorization { role: String, required: Vec<String> },
    #[error("{message}")]
    NotFound { code: &'static str, message: &'static str },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn bin_not_found() -> Self {
        CoreError::NotFound {
            code: "bin_not_found",
            message: "Trash bin not found",
        }
    }

    pub fn notification_not_found() -> Self {
        CoreError::NotFound {
            code: "notification_not_found",
            message: "Notification not found",
        }
    }
}

impl From<GuardError> for CoreError {
    fn from(value: GuardError) -> Self {
        match value {
            GuardError::Forbidden { role, required } => CoreError::Authorization { role, required },
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::Validation { message, .. } => ApiError::BadRequest {
                code: "validation_error",
                trace_id: None,
                message: Some(message),
            },
            CoreError::Authorization { required, .. } => ApiError::ForbiddenMissingRole {
                role: required.join(","),
                trace_id: None,
                message: Some("Only officers and admins can modify bins".into()),
            },
            CoreError::NotFound { code, message } => ApiError::not_found(code, message),
            CoreError::Store(err @ StoreError::Conflict(_)) => {
                ApiError::conflict("bin_conflict", err.to_string())
            }
            CoreError::Store(err) => {
                error!(?err, "store operation failed");
                ApiError::internal(err, None)
            }
        }
    }
}
