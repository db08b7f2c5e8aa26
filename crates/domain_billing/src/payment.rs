//! Payment application and voiding
//!
//! Payments against receivables do double duty: they settle the company's
//! document and they restore the employees' revolving balances in proportion
//! to what each client contributed to the document. The restoration ratio is
//! `payment / document total`, applied per client and capped at the client's
//! granted limit by the store adapter. Payable payments settle the provider's
//! net total and restore nothing.
//!
//! Planning is pure: `plan_*` functions compute the full effect of the
//! operation from a snapshot; the store commits the plan atomically and
//! re-checks the document totals under row locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use core_kernel::{
    ClientId, Clock, Money, PayableDocumentId, PayablePaymentId, ReceivableDocumentId,
    ReceivablePaymentId, UserId,
};

use crate::error::BillingError;
use crate::numbering::DocumentNumber;
use crate::payable::{PayableDocument, PayableStatus};
use crate::ports::BillingStore;
use crate::receivable::{ReceivableDocument, ReceivableStatus};
use std::sync::Arc;

/// How a payment was tendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Check,
    Card,
    Other,
}

/// A payment applied to a receivable document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivablePayment {
    pub id: ReceivablePaymentId,
    pub document_id: ReceivableDocumentId,
    /// Sequential receipt number in the `REC` series
    pub receipt_number: DocumentNumber,
    pub amount: Money,
    pub method: PaymentMethod,
    /// External reference (wire confirmation, check number)
    pub reference: Option<String>,
    pub registered_by: UserId,
    pub paid_at: DateTime<Utc>,
    pub voided: bool,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

/// A payment applied to a payable document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayablePayment {
    pub id: PayablePaymentId,
    pub document_id: PayableDocumentId,
    /// Sequential receipt number in the `PRV` series
    pub receipt_number: DocumentNumber,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub registered_by: UserId,
    pub paid_at: DateTime<Utc>,
    pub voided: bool,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

/// Request to apply a payment to a receivable
#[derive(Debug, Clone)]
pub struct ApplyReceivablePayment {
    pub document_id: ReceivableDocumentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub registered_by: UserId,
}

/// Request to apply a payment to a payable
#[derive(Debug, Clone)]
pub struct ApplyPayablePayment {
    pub document_id: PayableDocumentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub registered_by: UserId,
}

/// A per-client balance restoration computed from the payment ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestorationEntry {
    pub client_id: ClientId,
    /// Uncapped amount; the adapter caps at the client's granted limit
    pub amount: Money,
}

/// The full planned effect of a receivable payment
#[derive(Debug, Clone)]
pub struct ReceivablePaymentPlan {
    pub document_id: ReceivableDocumentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub registered_by: UserId,
    pub paid_at: DateTime<Utc>,
    pub new_paid_amount: Money,
    pub new_pending_amount: Money,
    pub new_status: ReceivableStatus,
    pub restorations: Vec<RestorationEntry>,
}

/// The full planned effect of a payable payment
#[derive(Debug, Clone)]
pub struct PayablePaymentPlan {
    pub document_id: PayableDocumentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub registered_by: UserId,
    pub paid_at: DateTime<Utc>,
    pub new_paid_amount: Money,
    pub new_pending_amount: Money,
    pub new_status: PayableStatus,
}

/// The planned effect of voiding a receivable payment
///
/// Voiding reopens the document balance but never claws back restored client
/// balances; a retraction could drive a balance negative after later spends.
#[derive(Debug, Clone)]
pub struct ReceivableVoidPlan {
    pub payment_id: ReceivablePaymentId,
    pub document_id: ReceivableDocumentId,
    pub amount: Money,
    pub reason: Option<String>,
    pub voided_at: DateTime<Utc>,
    pub new_paid_amount: Money,
    pub new_pending_amount: Money,
    pub new_status: ReceivableStatus,
}

/// The planned effect of voiding a payable payment
#[derive(Debug, Clone)]
pub struct PayableVoidPlan {
    pub payment_id: PayablePaymentId,
    pub document_id: PayableDocumentId,
    pub amount: Money,
    pub reason: Option<String>,
    pub voided_at: DateTime<Utc>,
    pub new_paid_amount: Money,
    pub new_pending_amount: Money,
    pub new_status: PayableStatus,
}

/// Plans a receivable payment from a document snapshot
///
/// `billed_by_client` is the per-client sum of the document's detail rows;
/// each client is restored `round(billed * payment / total, 2)`.
pub fn plan_receivable_payment(
    document: &ReceivableDocument,
    billed_by_client: &[(ClientId, Money)],
    request: &ApplyReceivablePayment,
    now: DateTime<Utc>,
) -> Result<ReceivablePaymentPlan, BillingError> {
    if matches!(document.status, ReceivableStatus::Voided) {
        return Err(BillingError::DocumentVoided);
    }
    if document.refinanced {
        return Err(BillingError::AlreadyRefinanced);
    }
    if !document.pending_amount.is_positive() {
        return Err(BillingError::AlreadyPaid);
    }
    if !request.amount.is_positive() || request.amount > document.pending_amount {
        return Err(BillingError::InvalidAmount {
            amount: request.amount,
            pending: document.pending_amount,
        });
    }

    let ratio = request
        .amount
        .ratio_of(document.total_amount)
        .map_err(|_| BillingError::InvalidAmount {
            amount: request.amount,
            pending: document.pending_amount,
        })?;

    let restorations = billed_by_client
        .iter()
        .map(|(client_id, billed)| RestorationEntry {
            client_id: *client_id,
            amount: billed.multiply(ratio),
        })
        .filter(|entry| entry.amount.is_positive())
        .collect();

    let new_paid = document.paid_amount + request.amount;
    let new_pending = document.pending_amount - request.amount;

    Ok(ReceivablePaymentPlan {
        document_id: document.id,
        amount: request.amount,
        method: request.method,
        reference: request.reference.clone(),
        registered_by: request.registered_by,
        paid_at: now,
        new_paid_amount: new_paid,
        new_pending_amount: new_pending,
        new_status: ReceivableStatus::derive(new_paid, new_pending, document.due_date, now),
        restorations,
    })
}

/// Plans a payable payment from a document snapshot
pub fn plan_payable_payment(
    document: &PayableDocument,
    request: &ApplyPayablePayment,
    now: DateTime<Utc>,
) -> Result<PayablePaymentPlan, BillingError> {
    if matches!(document.status, PayableStatus::Voided) {
        return Err(BillingError::DocumentVoided);
    }
    if !document.pending_amount.is_positive() {
        return Err(BillingError::AlreadyPaid);
    }
    if !request.amount.is_positive() || request.amount > document.pending_amount {
        return Err(BillingError::InvalidAmount {
            amount: request.amount,
            pending: document.pending_amount,
        });
    }

    let new_paid = document.paid_amount + request.amount;
    let new_pending = document.pending_amount - request.amount;

    Ok(PayablePaymentPlan {
        document_id: document.id,
        amount: request.amount,
        method: request.method,
        reference: request.reference.clone(),
        registered_by: request.registered_by,
        paid_at: now,
        new_paid_amount: new_paid,
        new_pending_amount: new_pending,
        new_status: PayableStatus::derive(new_paid, new_pending, document.due_date, now),
    })
}

/// Plans the void of a receivable payment
pub fn plan_void_receivable_payment(
    document: &ReceivableDocument,
    payment: &ReceivablePayment,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<ReceivableVoidPlan, BillingError> {
    if payment.voided {
        return Err(BillingError::PaymentAlreadyVoided);
    }
    if matches!(document.status, ReceivableStatus::Voided) {
        return Err(BillingError::DocumentVoided);
    }

    let new_paid = document.paid_amount - payment.amount;
    let new_pending = document.pending_amount + payment.amount;
    let new_status = if document.refinanced {
        ReceivableStatus::Refinanced
    } else {
        ReceivableStatus::derive(new_paid, new_pending, document.due_date, now)
    };

    Ok(ReceivableVoidPlan {
        payment_id: payment.id,
        document_id: document.id,
        amount: payment.amount,
        reason,
        voided_at: now,
        new_paid_amount: new_paid,
        new_pending_amount: new_pending,
        new_status,
    })
}

/// Plans the void of a payable payment
pub fn plan_void_payable_payment(
    document: &PayableDocument,
    payment: &PayablePayment,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<PayableVoidPlan, BillingError> {
    if payment.voided {
        return Err(BillingError::PaymentAlreadyVoided);
    }
    if matches!(document.status, PayableStatus::Voided) {
        return Err(BillingError::DocumentVoided);
    }

    let new_paid = document.paid_amount - payment.amount;
    let new_pending = document.pending_amount + payment.amount;

    Ok(PayableVoidPlan {
        payment_id: payment.id,
        document_id: document.id,
        amount: payment.amount,
        reason,
        voided_at: now,
        new_paid_amount: new_paid,
        new_pending_amount: new_pending,
        new_status: PayableStatus::derive(new_paid, new_pending, document.due_date, now),
    })
}

/// Result of a committed receivable payment
#[derive(Debug, Clone)]
pub struct ReceivablePaymentReceipt {
    pub payment_id: ReceivablePaymentId,
    pub receipt_number: DocumentNumber,
    pub amount: Money,
    pub document_status: ReceivableStatus,
    /// Per-client amounts actually credited after the limit cap
    pub restored: Vec<RestorationEntry>,
}

/// Result of a committed payable payment
#[derive(Debug, Clone)]
pub struct PayablePaymentReceipt {
    pub payment_id: PayablePaymentId,
    pub receipt_number: DocumentNumber,
    pub amount: Money,
    pub document_status: PayableStatus,
}

/// Applies and voids payments over a `BillingStore`
pub struct PaymentService<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: BillingStore> PaymentService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Applies a payment to a receivable and restores client balances
    /// proportionally
    #[instrument(skip(self, request), fields(document_id = %request.document_id, amount = %request.amount))]
    pub async fn apply_receivable_payment(
        &self,
        request: ApplyReceivablePayment,
    ) -> Result<ReceivablePaymentReceipt, BillingError> {
        let now = self.clock.now();
        let mut document = self
            .store
            .find_receivable(request.document_id)
            .await?
            .ok_or_else(|| BillingError::DocumentNotFound(request.document_id.to_string()))?;
        document.refresh_status(now);

        let billed = self.store.billed_amounts_by_client(document.id).await?;
        let plan = plan_receivable_payment(&document, &billed, &request, now)?;

        let receipt = self.store.commit_receivable_payment(&plan).await?;
        info!(
            receipt = %receipt.receipt_number,
            status = ?receipt.document_status,
            clients_restored = receipt.restored.len(),
            "receivable payment applied"
        );
        Ok(receipt)
    }

    /// Applies a payment to a payable
    #[instrument(skip(self, request), fields(document_id = %request.document_id, amount = %request.amount))]
    pub async fn apply_payable_payment(
        &self,
        request: ApplyPayablePayment,
    ) -> Result<PayablePaymentReceipt, BillingError> {
        let now = self.clock.now();
        let mut document = self
            .store
            .find_payable(request.document_id)
            .await?
            .ok_or_else(|| BillingError::DocumentNotFound(request.document_id.to_string()))?;
        document.refresh_status(now);

        let plan = plan_payable_payment(&document, &request, now)?;

        let receipt = self.store.commit_payable_payment(&plan).await?;
        info!(receipt = %receipt.receipt_number, status = ?receipt.document_status, "payable payment applied");
        Ok(receipt)
    }

    /// Voids a receivable payment, reopening the document balance
    ///
    /// Restored client balances stay restored; see `ReceivableVoidPlan`.
    #[instrument(skip(self, reason), fields(payment_id = %payment_id))]
    pub async fn void_receivable_payment(
        &self,
        payment_id: ReceivablePaymentId,
        reason: Option<String>,
    ) -> Result<ReceivableStatus, BillingError> {
        let now = self.clock.now();
        let (payment, document) = self
            .store
            .find_receivable_payment(payment_id)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))?;

        let plan = plan_void_receivable_payment(&document, &payment, reason, now)?;
        self.store.commit_void_receivable_payment(&plan).await?;
        info!(document_id = %plan.document_id, status = ?plan.new_status, "receivable payment voided");
        Ok(plan.new_status)
    }

    /// Voids a payable payment
    #[instrument(skip(self, reason), fields(payment_id = %payment_id))]
    pub async fn void_payable_payment(
        &self,
        payment_id: PayablePaymentId,
        reason: Option<String>,
    ) -> Result<PayableStatus, BillingError> {
        let now = self.clock.now();
        let (payment, document) = self
            .store
            .find_payable_payment(payment_id)
            .await?
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))?;

        let plan = plan_void_payable_payment(&document, &payment, reason, now)?;
        self.store.commit_void_payable_payment(&plan).await?;
        info!(document_id = %plan.document_id, status = ?plan.new_status, "payable payment voided");
        Ok(plan.new_status)
    }

    /// Voids an unpaid, unrefinanced receivable document
    ///
    /// The document's consumptions become billable again in the next cycle.
    #[instrument(skip(self, reason), fields(document_id = %document_id))]
    pub async fn void_receivable_document(
        &self,
        document_id: ReceivableDocumentId,
        reason: Option<String>,
    ) -> Result<(), BillingError> {
        let now = self.clock.now();
        let document = self
            .store
            .find_receivable(document_id)
            .await?
            .ok_or_else(|| BillingError::DocumentNotFound(document_id.to_string()))?;

        document.ensure_voidable()?;
        self.store
            .commit_receivable_void(document_id, reason, now)
            .await?;
        info!("receivable document voided");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbering::DocumentSeries;
    use chrono::Duration;
    use core_kernel::CompanyId;
    use rust_decimal_macros::dec;

    fn document(total: &str) -> ReceivableDocument {
        let now = Utc::now();
        let total = Money::new(total.parse().unwrap());
        ReceivableDocument {
            id: ReceivableDocumentId::new_v7(),
            company_id: CompanyId::new(),
            document_number: DocumentNumber::format(DocumentSeries::Receivable, 2026, 1),
            period_from: now - Duration::days(30),
            period_to: now,
            issued_at: now,
            due_date: now + Duration::days(10),
            total_amount: total,
            paid_amount: Money::zero(),
            pending_amount: total,
            status: ReceivableStatus::Pending,
            refinanced: false,
            voided_at: None,
            void_reason: None,
            notes: None,
        }
    }

    fn request(doc: &ReceivableDocument, amount: &str) -> ApplyReceivablePayment {
        ApplyReceivablePayment {
            document_id: doc.id,
            amount: Money::new(amount.parse().unwrap()),
            method: PaymentMethod::Transfer,
            reference: None,
            registered_by: UserId::new(),
        }
    }

    #[test]
    fn test_partial_payment_restores_proportionally() {
        // the canonical half-payment scenario: 1000 billed as 600 + 400,
        // paying 500 restores 300 and 200
        let doc = document("1000");
        let alice = ClientId::new();
        let bob = ClientId::new();
        let billed = vec![
            (alice, Money::new(dec!(600))),
            (bob, Money::new(dec!(400))),
        ];

        let plan =
            plan_receivable_payment(&doc, &billed, &request(&doc, "500"), Utc::now()).unwrap();

        assert_eq!(plan.new_paid_amount, Money::new(dec!(500)));
        assert_eq!(plan.new_pending_amount, Money::new(dec!(500)));
        assert_eq!(plan.new_status, ReceivableStatus::PartiallyPaid);
        assert_eq!(
            plan.restorations,
            vec![
                RestorationEntry {
                    client_id: alice,
                    amount: Money::new(dec!(300))
                },
                RestorationEntry {
                    client_id: bob,
                    amount: Money::new(dec!(200))
                },
            ]
        );
    }

    #[test]
    fn test_full_payment_restores_exact_billed_amounts() {
        let doc = document("1000");
        let alice = ClientId::new();
        let billed = vec![(alice, Money::new(dec!(1000)))];

        let plan =
            plan_receivable_payment(&doc, &billed, &request(&doc, "1000"), Utc::now()).unwrap();

        assert_eq!(plan.new_status, ReceivableStatus::Paid);
        assert_eq!(plan.restorations[0].amount, Money::new(dec!(1000)));
    }

    #[test]
    fn test_overpayment_rejected() {
        let doc = document("1000");
        let result =
            plan_receivable_payment(&doc, &[], &request(&doc, "1000.01"), Utc::now());
        assert!(matches!(result, Err(BillingError::InvalidAmount { .. })));
    }

    #[test]
    fn test_payment_rejected_on_refinanced_document() {
        let mut doc = document("1000");
        doc.mark_refinanced();
        let result = plan_receivable_payment(&doc, &[], &request(&doc, "100"), Utc::now());
        assert!(matches!(result, Err(BillingError::AlreadyRefinanced)));
    }

    #[test]
    fn test_payment_rejected_on_paid_document() {
        let mut doc = document("1000");
        doc.record_payment(Money::new(dec!(1000)), Utc::now());
        let result = plan_receivable_payment(&doc, &[], &request(&doc, "1"), Utc::now());
        assert!(matches!(result, Err(BillingError::AlreadyPaid)));
    }

    #[test]
    fn test_restoration_rounds_per_client() {
        // 3 equal clients, payment ratio of 1/3: each restoration rounds
        // independently at two decimals
        let doc = document("100");
        let billed: Vec<(ClientId, Money)> = (0..3)
            .map(|_| (ClientId::new(), Money::new(dec!(33.33))))
            .collect();

        let plan = plan_receivable_payment(
            &doc,
            &billed,
            &request(&doc, "50"),
            Utc::now(),
        )
        .unwrap();

        for entry in &plan.restorations {
            // 33.33 * 0.5 = 16.665 -> banker's rounding -> 16.66
            assert_eq!(entry.amount, Money::new(dec!(16.66)));
        }
    }

    #[test]
    fn test_void_plan_reopens_balance_without_clawback() {
        let mut doc = document("1000");
        let now = Utc::now();
        doc.record_payment(Money::new(dec!(1000)), now);

        let payment = ReceivablePayment {
            id: ReceivablePaymentId::new_v7(),
            document_id: doc.id,
            receipt_number: DocumentNumber::format(DocumentSeries::ReceivableReceipt, 2026, 1),
            amount: Money::new(dec!(1000)),
            method: PaymentMethod::Cash,
            reference: None,
            registered_by: UserId::new(),
            paid_at: now,
            voided: false,
            voided_at: None,
            void_reason: None,
        };

        let plan =
            plan_void_receivable_payment(&doc, &payment, Some("bounced".to_string()), now)
                .unwrap();
        assert_eq!(plan.new_pending_amount, Money::new(dec!(1000)));
        assert_eq!(plan.new_status, ReceivableStatus::Pending);

        let mut voided = payment.clone();
        voided.voided = true;
        assert!(matches!(
            plan_void_receivable_payment(&doc, &voided, None, now),
            Err(BillingError::PaymentAlreadyVoided)
        ));
    }
}
