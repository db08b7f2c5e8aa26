//! Ledger handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_ledger::{CloseCashbox, RegisterConsumption, ReverseConsumption};

use crate::dto::ledger::*;
use crate::{error::ApiError, AppState};

/// Registers a consumption against a client's revolving balance
pub async fn register_consumption(
    State(state): State<AppState>,
    Json(request): Json<RegisterConsumptionRequest>,
) -> Result<Json<ConsumptionRegisteredResponse>, ApiError> {
    request.validate()?;
    let receipt = state
        .register
        .register(RegisterConsumption {
            client_id: request.client_id.into(),
            provider_id: request.provider_id.into(),
            store_id: request.store_id.into(),
            cashbox_id: request.cashbox_id.into(),
            amount: Money::new(request.amount),
            concept: request.concept,
            reference: request.reference,
            registered_by: request.registered_by.into(),
        })
        .await?;
    Ok(Json(receipt.into()))
}

/// Reverses a consumption, restoring the client balance capped at the limit
pub async fn reverse_consumption(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReverseConsumptionRequest>,
) -> Result<Json<ConsumptionReversedResponse>, ApiError> {
    request.validate()?;
    let receipt = state
        .register
        .reverse(ReverseConsumption {
            consumption_id: id.into(),
            reversed_by: request.reversed_by.into(),
            reason: request.reason,
        })
        .await?;
    Ok(Json(receipt.into()))
}

/// Declares today's cash closure for a cashier's shift
pub async fn close_cashbox(
    State(state): State<AppState>,
    Json(request): Json<CloseCashboxRequest>,
) -> Result<Json<ClosureResponse>, ApiError> {
    request.validate()?;
    let receipt = state
        .closures
        .close(CloseCashbox {
            user_id: request.user_id.into(),
            cashbox_id: request.cashbox_id.into(),
            company_id: request.company_id.map(Into::into),
            notes: request.notes,
        })
        .await?;
    Ok(Json(receipt.into()))
}
