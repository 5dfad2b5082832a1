use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::storage::{MutationError, StorageError},
    state::{AbortError, ApplyError, PlanError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No session is live.
    #[error("no active session")]
    NoActiveSession,
    /// The actor is not an administrator.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// A map win was declared on a tied score.
    #[error("map {map_number} is tied; no winner can be declared")]
    TiedMap { map_number: u32 },
    /// The session already ended.
    #[error("session already ended")]
    SessionEnded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// One of the stores could not be reached.
    #[error("store unavailable")]
    StoreUnavailable(#[source] StorageError),
    /// Status record and live document disagree.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The storage supervisor flagged a store as unhealthy.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable { .. } => ServiceError::StoreUnavailable(err),
            StorageError::AlreadyExists { match_id } => {
                ServiceError::InvalidState(format!("match {match_id} already has a live document"))
            }
            StorageError::NotFound { match_id } => {
                ServiceError::NotFound(format!("match {match_id}"))
            }
            StorageError::Conflict { match_id } => ServiceError::InvalidState(format!(
                "live document of match {match_id} changed concurrently; retry"
            )),
            StorageError::Rejected(rejection) => rejection.into(),
        }
    }
}

impl From<MutationError> for ServiceError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::Finished => ServiceError::SessionEnded,
            MutationError::Tied(map_number) => ServiceError::TiedMap { map_number },
            other => ServiceError::InvalidState(other.to_string()),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NoActiveSession => AppError::NotFound(message),
            ServiceError::Unauthorized(reason) => AppError::Unauthorized(reason),
            ServiceError::TiedMap { .. }
            | ServiceError::SessionEnded
            | ServiceError::InvalidState(_) => AppError::Conflict(message),
            ServiceError::InvalidInput(reason) => AppError::BadRequest(reason),
            ServiceError::StoreUnavailable(source) => {
                AppError::ServiceUnavailable(source.to_string())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InconsistentState(_) => AppError::Internal(message),
            ServiceError::NotFound(what) => AppError::NotFound(what),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("panel transition already pending".into())
            }
            PlanError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(invalid.to_string())
            }
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => ServiceError::InvalidState(format!(
                "panel changed during transition (expected {expected:?}, got {actual:?})"
            )),
            ApplyError::VersionMismatch { expected, actual } => {
                ServiceError::InvalidState(format!(
                    "panel version mismatch during transition (expected {expected}, got {actual})"
                ))
            }
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidState("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("transition plan does not match".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_rejections_map_to_service_errors() {
        let tied: ServiceError = StorageError::Rejected(MutationError::Tied(2)).into();
        assert!(matches!(tied, ServiceError::TiedMap { map_number: 2 }));

        let ended: ServiceError = StorageError::Rejected(MutationError::Finished).into();
        assert!(matches!(ended, ServiceError::SessionEnded));

        let missing: ServiceError = StorageError::NotFound { match_id: 4 }.into();
        assert!(matches!(missing, ServiceError::NotFound(_)));
    }

    #[test]
    fn service_errors_pick_http_statuses() {
        let status = |err: ServiceError| AppError::from(err).into_response().status();
        assert_eq!(status(ServiceError::NoActiveSession), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ServiceError::Unauthorized("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(ServiceError::TiedMap { map_number: 1 }),
            StatusCode::CONFLICT
        );
        assert_eq!(status(ServiceError::SessionEnded), StatusCode::CONFLICT);
        assert_eq!(
            status(ServiceError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(ServiceError::Degraded), StatusCode::SERVICE_UNAVAILABLE);
    }
}
