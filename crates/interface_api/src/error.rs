//! API error handling
//!
//! Domain errors map onto a small set of HTTP shapes: missing entities are
//! 404, rejected business transitions are 409, malformed requests are 422
//! and assignment failures are 403. `PortError::Conflict` from a lost
//! optimistic race also surfaces as 409 so clients can retry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use core_kernel::PortError;
use domain_billing::BillingError;
use domain_ledger::LedgerError;
use domain_refinancing::RefinancingError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone())
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else if matches!(err, PortError::Conflict { .. }) {
            ApiError::Conflict(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount(_) | LedgerError::InvalidHierarchy(_) => {
                ApiError::Validation(err.to_string())
            }
            LedgerError::Unauthorized { .. } => ApiError::Forbidden(err.to_string()),
            LedgerError::CashboxNotFound(_)
            | LedgerError::ClientNotFound(_)
            | LedgerError::ConsumptionNotFound(_) => ApiError::NotFound(err.to_string()),
            LedgerError::CashboxClosed { .. }
            | LedgerError::ClientInactive(_)
            | LedgerError::CompanyInactive(_)
            | LedgerError::InsufficientBalance { .. }
            | LedgerError::CompanyLimitExceeded { .. }
            | LedgerError::AlreadyReversed(_)
            | LedgerError::AlreadyClosed { .. } => ApiError::Conflict(err.to_string()),
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InvalidPeriod { .. } | BillingError::InvalidAmount { .. } => {
                ApiError::Validation(err.to_string())
            }
            BillingError::CompanyNotFound(_)
            | BillingError::ProviderNotFound(_)
            | BillingError::DocumentNotFound(_)
            | BillingError::PaymentNotFound(_) => ApiError::NotFound(err.to_string()),
            BillingError::DuplicatePeriod
            | BillingError::NothingToBill
            | BillingError::AlreadyPaid
            | BillingError::DocumentVoided
            | BillingError::AlreadyRefinanced
            | BillingError::PaymentAlreadyVoided => ApiError::Conflict(err.to_string()),
            BillingError::Store(e) => e.into(),
        }
    }
}

impl From<RefinancingError> for ApiError {
    fn from(err: RefinancingError) -> Self {
        match err {
            RefinancingError::InvalidAmount { .. } => ApiError::Validation(err.to_string()),
            RefinancingError::DocumentNotFound(_) | RefinancingError::RefinancingNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            RefinancingError::SourceAlreadyPaid
            | RefinancingError::SourceVoided
            | RefinancingError::AlreadyRefinanced
            | RefinancingError::NoPendingBalance
            | RefinancingError::AlreadyPaid
            | RefinancingError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            RefinancingError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::NotFound("client".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_port_conflict_maps_to_409() {
        let err: ApiError = PortError::conflict("raced").into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_duplicate_period_maps_to_409() {
        let err: ApiError = BillingError::DuplicatePeriod.into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_unauthorized_maps_to_403() {
        let err: ApiError = LedgerError::Unauthorized {
            user_id: core_kernel::UserId::new(),
            cashbox_id: core_kernel::CashboxId::new(),
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }
}
