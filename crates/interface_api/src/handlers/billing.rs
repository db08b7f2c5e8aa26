//! Billing handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_billing::ports::BillingStore;
use domain_billing::{
    ApplyPayablePayment, ApplyReceivablePayment, BillingError, GeneratePayable,
    GenerateReceivable,
};

use crate::dto::billing::*;
use crate::{error::ApiError, AppState};

/// Runs a receivable billing cycle for a company and period
pub async fn generate_receivable(
    State(state): State<AppState>,
    Json(request): Json<GenerateReceivableRequest>,
) -> Result<Json<ReceivableIssuedResponse>, ApiError> {
    request.validate()?;
    let issued = state
        .cycles
        .generate_receivable(GenerateReceivable {
            company_id: request.company_id.into(),
            period_from: request.period_from,
            period_to: request.period_to,
            notes: request.notes,
        })
        .await?;
    Ok(Json(issued.into()))
}

/// Gets a receivable document
pub async fn get_receivable(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReceivableDocumentResponse>, ApiError> {
    let document = state
        .billing_store
        .find_receivable(id.into())
        .await
        .map_err(BillingError::Store)?
        .ok_or_else(|| ApiError::NotFound(format!("receivable document {id}")))?;
    Ok(Json(document.into()))
}

/// Applies a payment to a receivable, restoring client balances
/// proportionally
pub async fn pay_receivable(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApplyPaymentRequest>,
) -> Result<Json<ReceivablePaymentResponse>, ApiError> {
    request.validate()?;
    let receipt = state
        .payments
        .apply_receivable_payment(ApplyReceivablePayment {
            document_id: id.into(),
            amount: Money::new(request.amount),
            method: request.method,
            reference: request.reference,
            registered_by: request.registered_by.into(),
        })
        .await?;
    Ok(Json(receipt.into()))
}

/// Voids an unpaid receivable document, freeing its consumptions for a
/// future cycle
pub async fn void_receivable(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<VoidRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request.validate()?;
    state
        .payments
        .void_receivable_document(id.into(), request.reason)
        .await?;
    Ok(Json(serde_json::json!({ "voided": true })))
}

/// Runs a payable settlement cycle for a provider and period
pub async fn generate_payable(
    State(state): State<AppState>,
    Json(request): Json<GeneratePayableRequest>,
) -> Result<Json<PayableIssuedResponse>, ApiError> {
    request.validate()?;
    let issued = state
        .cycles
        .generate_payable(GeneratePayable {
            provider_id: request.provider_id.into(),
            period_from: request.period_from,
            period_to: request.period_to,
            notes: request.notes,
        })
        .await?;
    Ok(Json(issued.into()))
}

/// Gets a payable document
pub async fn get_payable(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PayableDocumentResponse>, ApiError> {
    let document = state
        .billing_store
        .find_payable(id.into())
        .await
        .map_err(BillingError::Store)?
        .ok_or_else(|| ApiError::NotFound(format!("payable document {id}")))?;
    Ok(Json(document.into()))
}

/// Applies a payment to a payable
pub async fn pay_payable(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApplyPaymentRequest>,
) -> Result<Json<PayablePaymentResponse>, ApiError> {
    request.validate()?;
    let receipt = state
        .payments
        .apply_payable_payment(ApplyPayablePayment {
            document_id: id.into(),
            amount: Money::new(request.amount),
            method: request.method,
            reference: request.reference,
            registered_by: request.registered_by.into(),
        })
        .await?;
    Ok(Json(receipt.into()))
}

/// Voids a receivable payment; restored balances stay restored
pub async fn void_receivable_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<VoidRequest>,
) -> Result<Json<ReceivableStatusResponse>, ApiError> {
    request.validate()?;
    let status = state
        .payments
        .void_receivable_payment(id.into(), request.reason)
        .await?;
    Ok(Json(ReceivableStatusResponse {
        document_status: status,
    }))
}

/// Voids a payable payment
pub async fn void_payable_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<VoidRequest>,
) -> Result<Json<PayableStatusResponse>, ApiError> {
    request.validate()?;
    let status = state
        .payments
        .void_payable_payment(id.into(), request.reason)
        .await?;
    Ok(Json(PayableStatusResponse {
        document_status: status,
    }))
}
