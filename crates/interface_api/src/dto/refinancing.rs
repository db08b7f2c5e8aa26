//! Refinancing DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_billing::PaymentMethod;
use domain_refinancing::{IssuedRefinancing, RefinancingDebt, RefinancingStatus};

use crate::dto::billing::RestorationResponse;

/// Request to refinance a receivable document
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefinancingRequest {
    pub document_id: Uuid,
    pub new_due_date: DateTime<Utc>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinancingIssuedResponse {
    pub refinancing_id: Uuid,
    pub refinancing_number: String,
    pub original_amount: Money,
    pub due_date: DateTime<Utc>,
    pub clients_restored: Vec<RestorationResponse>,
}

impl From<IssuedRefinancing> for RefinancingIssuedResponse {
    fn from(issued: IssuedRefinancing) -> Self {
        Self {
            refinancing_id: issued.refinancing_id.into(),
            refinancing_number: issued.refinancing_number.as_str().to_string(),
            original_amount: issued.original_amount,
            due_date: issued.due_date,
            clients_restored: issued
                .restored
                .into_iter()
                .map(|(client_id, amount)| RestorationResponse {
                    client_id: client_id.into(),
                    amount,
                })
                .collect(),
        }
    }
}

/// A refinancing debt as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinancingResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub company_id: Uuid,
    pub refinancing_number: String,
    pub original_amount: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub due_date: DateTime<Utc>,
    pub status: RefinancingStatus,
    pub reason: Option<String>,
}

impl From<RefinancingDebt> for RefinancingResponse {
    fn from(debt: RefinancingDebt) -> Self {
        Self {
            id: debt.id.into(),
            document_id: debt.document_id.into(),
            company_id: debt.company_id.into(),
            refinancing_number: debt.refinancing_number.as_str().to_string(),
            original_amount: debt.original_amount,
            paid_amount: debt.paid_amount,
            pending_amount: debt.pending_amount,
            due_date: debt.due_date,
            status: debt.status,
            reason: debt.reason,
        }
    }
}

/// Request to pay against a refinancing debt
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefinancingPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    pub registered_by: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinancingStatusResponse {
    pub status: RefinancingStatus,
}

/// Request to write a debt off
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WriteOffRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOffResponse {
    pub lost_amount: Money,
}
