//! Refinancing handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_refinancing::ports::RefinancingStore;
use domain_refinancing::{ApplyRefinancingPayment, CreateRefinancing, RefinancingError};

use crate::dto::refinancing::*;
use crate::{error::ApiError, AppState};

/// Refinances a receivable document's outstanding balance into a new debt
pub async fn create_refinancing(
    State(state): State<AppState>,
    Json(request): Json<CreateRefinancingRequest>,
) -> Result<Json<RefinancingIssuedResponse>, ApiError> {
    request.validate()?;
    let issued = state
        .refinancing
        .create(CreateRefinancing {
            document_id: request.document_id.into(),
            new_due_date: request.new_due_date,
            reason: request.reason,
        })
        .await?;
    Ok(Json(issued.into()))
}

/// Gets a refinancing debt
pub async fn get_refinancing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RefinancingResponse>, ApiError> {
    let debt = state
        .refinancing_store
        .find_refinancing(id.into())
        .await
        .map_err(RefinancingError::Store)?
        .ok_or_else(|| ApiError::NotFound(format!("refinancing {id}")))?;
    Ok(Json(debt.into()))
}

/// Applies a payment to a refinancing debt
pub async fn pay_refinancing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RefinancingPaymentRequest>,
) -> Result<Json<RefinancingStatusResponse>, ApiError> {
    request.validate()?;
    let status = state
        .refinancing
        .apply_payment(ApplyRefinancingPayment {
            refinancing_id: id.into(),
            amount: Money::new(request.amount),
            method: request.method,
            reference: request.reference,
            registered_by: request.registered_by.into(),
        })
        .await?;
    Ok(Json(RefinancingStatusResponse { status }))
}

/// Writes a refinancing debt off as uncollectable
pub async fn write_off_refinancing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<WriteOffRequest>,
) -> Result<Json<WriteOffResponse>, ApiError> {
    request.validate()?;
    let lost = state
        .refinancing
        .write_off(id.into(), request.reason)
        .await?;
    Ok(Json(WriteOffResponse { lost_amount: lost }))
}
