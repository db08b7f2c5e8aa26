//! Ledger DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_ledger::{ClosureReceipt, RegistrationReceipt, ReversalReceipt};

/// Request to register a consumption
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterConsumptionRequest {
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub store_id: Uuid,
    pub cashbox_id: Uuid,
    pub amount: Decimal,
    #[validate(length(max = 255))]
    pub concept: Option<String>,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    pub registered_by: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRegisteredResponse {
    pub consumption_id: Uuid,
    pub new_client_balance: Money,
}

impl From<RegistrationReceipt> for ConsumptionRegisteredResponse {
    fn from(receipt: RegistrationReceipt) -> Self {
        Self {
            consumption_id: receipt.consumption_id.into(),
            new_client_balance: receipt.new_client_balance,
        }
    }
}

/// Request to reverse a consumption
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReverseConsumptionRequest {
    pub reversed_by: Uuid,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionReversedResponse {
    pub consumption_id: Uuid,
    pub amount_restored: Money,
    pub new_client_balance: Money,
}

impl From<ReversalReceipt> for ConsumptionReversedResponse {
    fn from(receipt: ReversalReceipt) -> Self {
        Self {
            consumption_id: receipt.consumption_id.into(),
            amount_restored: receipt.amount_restored,
            new_client_balance: receipt.new_client_balance,
        }
    }
}

/// Request to declare a cash closure
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CloseCashboxRequest {
    pub user_id: Uuid,
    pub cashbox_id: Uuid,
    pub company_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureResponse {
    pub closure_id: Uuid,
    pub consumption_count: u32,
    pub reversed_count: u32,
    pub total_amount: Money,
    pub reversed_amount: Money,
}

impl From<ClosureReceipt> for ClosureResponse {
    fn from(receipt: ClosureReceipt) -> Self {
        Self {
            closure_id: receipt.closure_id.into(),
            consumption_count: receipt.totals.consumption_count,
            reversed_count: receipt.totals.reversed_count,
            total_amount: receipt.totals.total_amount,
            reversed_amount: receipt.totals.reversed_amount,
        }
    }
}
