//! Billing DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_billing::{
    IssuedPayable, IssuedReceivable, PayableDocument, PayablePaymentReceipt, PayableStatus,
    PaymentMethod, ReceivableDocument, ReceivablePaymentReceipt, ReceivableStatus,
};

/// Request to run a receivable billing cycle
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReceivableRequest {
    pub company_id: Uuid,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivableIssuedResponse {
    pub document_id: Uuid,
    pub document_number: String,
    pub total_amount: Money,
    pub due_date: DateTime<Utc>,
    pub detail_count: usize,
}

impl From<IssuedReceivable> for ReceivableIssuedResponse {
    fn from(issued: IssuedReceivable) -> Self {
        Self {
            document_id: issued.document_id.into(),
            document_number: issued.document_number.as_str().to_string(),
            total_amount: issued.total_amount,
            due_date: issued.due_date,
            detail_count: issued.detail_count,
        }
    }
}

/// Request to run a payable settlement cycle
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePayableRequest {
    pub provider_id: Uuid,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayableIssuedResponse {
    pub document_id: Uuid,
    pub document_number: String,
    pub gross_total: Money,
    pub commission_total: Money,
    pub net_total: Money,
    pub detail_count: usize,
}

impl From<IssuedPayable> for PayableIssuedResponse {
    fn from(issued: IssuedPayable) -> Self {
        Self {
            document_id: issued.document_id.into(),
            document_number: issued.document_number.as_str().to_string(),
            gross_total: issued.gross_total,
            commission_total: issued.commission_total,
            net_total: issued.net_total,
            detail_count: issued.detail_count,
        }
    }
}

/// A receivable document as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivableDocumentResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub document_number: String,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub status: ReceivableStatus,
    pub refinanced: bool,
    pub notes: Option<String>,
}

impl From<ReceivableDocument> for ReceivableDocumentResponse {
    fn from(doc: ReceivableDocument) -> Self {
        Self {
            id: doc.id.into(),
            company_id: doc.company_id.into(),
            document_number: doc.document_number.as_str().to_string(),
            period_from: doc.period_from,
            period_to: doc.period_to,
            issued_at: doc.issued_at,
            due_date: doc.due_date,
            total_amount: doc.total_amount,
            paid_amount: doc.paid_amount,
            pending_amount: doc.pending_amount,
            status: doc.status,
            refinanced: doc.refinanced,
            notes: doc.notes,
        }
    }
}

/// A payable document as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayableDocumentResponse {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub document_number: String,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub gross_total: Money,
    pub commission_total: Money,
    pub net_total: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub status: PayableStatus,
    pub notes: Option<String>,
}

impl From<PayableDocument> for PayableDocumentResponse {
    fn from(doc: PayableDocument) -> Self {
        Self {
            id: doc.id.into(),
            provider_id: doc.provider_id.into(),
            document_number: doc.document_number.as_str().to_string(),
            period_from: doc.period_from,
            period_to: doc.period_to,
            issued_at: doc.issued_at,
            due_date: doc.due_date,
            gross_total: doc.gross_total,
            commission_total: doc.commission_total,
            net_total: doc.net_total,
            paid_amount: doc.paid_amount,
            pending_amount: doc.pending_amount,
            status: doc.status,
            notes: doc.notes,
        }
    }
}

/// Request to apply a payment to a document
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
    pub registered_by: Uuid,
}

/// A client balance restoration caused by a payment
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorationResponse {
    pub client_id: Uuid,
    pub amount: Money,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivablePaymentResponse {
    pub payment_id: Uuid,
    pub receipt_number: String,
    pub amount: Money,
    pub document_status: ReceivableStatus,
    pub clients_restored: Vec<RestorationResponse>,
}

impl From<ReceivablePaymentReceipt> for ReceivablePaymentResponse {
    fn from(receipt: ReceivablePaymentReceipt) -> Self {
        Self {
            payment_id: receipt.payment_id.into(),
            receipt_number: receipt.receipt_number.as_str().to_string(),
            amount: receipt.amount,
            document_status: receipt.document_status,
            clients_restored: receipt
                .restored
                .into_iter()
                .map(|r| RestorationResponse {
                    client_id: r.client_id.into(),
                    amount: r.amount,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayablePaymentResponse {
    pub payment_id: Uuid,
    pub receipt_number: String,
    pub amount: Money,
    pub document_status: PayableStatus,
}

impl From<PayablePaymentReceipt> for PayablePaymentResponse {
    fn from(receipt: PayablePaymentReceipt) -> Self {
        Self {
            payment_id: receipt.payment_id.into(),
            receipt_number: receipt.receipt_number.as_str().to_string(),
            amount: receipt.amount,
            document_status: receipt.document_status,
        }
    }
}

/// Request to void a payment or document
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoidRequest {
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivableStatusResponse {
    pub document_status: ReceivableStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayableStatusResponse {
    pub document_status: PayableStatus,
}
