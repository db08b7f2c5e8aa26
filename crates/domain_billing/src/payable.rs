//! Payable documents (provider settlement)
//!
//! The payable mirror of the receivable cycle: one document per provider and
//! period, with a detail row per consumption carrying the gross amount, the
//! commission retained by the platform, and the net owed to the provider.
//! Payments settle the net total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ConsumptionId, DetailId, Money, PayableDocumentId, ProviderId};

use crate::error::BillingError;
use crate::numbering::DocumentNumber;

/// Days after issuance before a payable falls due
pub const PAYABLE_TERM_DAYS: i64 = 30;

/// Lifecycle states of a payable document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayableStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    Voided,
}

impl PayableStatus {
    /// Derives the non-voided status from amounts and the clock
    pub fn derive(
        paid: Money,
        pending: Money,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if !pending.is_positive() {
            PayableStatus::Paid
        } else if paid.is_positive() {
            PayableStatus::PartiallyPaid
        } else if due_date < now {
            PayableStatus::Overdue
        } else {
            PayableStatus::Pending
        }
    }

    pub fn accepts_payments(&self) -> bool {
        matches!(
            self,
            PayableStatus::Pending | PayableStatus::PartiallyPaid | PayableStatus::Overdue
        )
    }
}

/// One settled consumption inside a payable document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayableDetail {
    pub id: DetailId,
    pub document_id: PayableDocumentId,
    pub consumption_id: ConsumptionId,
    /// Gross amount charged to the client
    pub gross_amount: Money,
    /// Platform commission retained
    pub commission_amount: Money,
    /// Net owed to the provider: `gross - commission`
    pub net_amount: Money,
}

/// A payable document owed to a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayableDocument {
    pub id: PayableDocumentId,
    pub provider_id: ProviderId,
    /// Sequential number in the `CXP` series
    pub document_number: DocumentNumber,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub gross_total: Money,
    pub commission_total: Money,
    /// Net owed; payments settle against this
    pub net_total: Money,
    pub paid_amount: Money,
    /// `net_total - paid_amount`
    pub pending_amount: Money,
    pub status: PayableStatus,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub notes: Option<String>,
}

impl PayableDocument {
    /// Recomputes the derived status; `Voided` is sticky
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        if matches!(self.status, PayableStatus::Voided) {
            return;
        }
        self.status =
            PayableStatus::derive(self.paid_amount, self.pending_amount, self.due_date, now);
    }

    /// Applies a payment amount to the header totals
    pub fn record_payment(&mut self, amount: Money, now: DateTime<Utc>) {
        self.paid_amount = self.paid_amount + amount;
        self.pending_amount = self.pending_amount - amount;
        self.refresh_status(now);
    }

    /// Undoes a voided payment's effect on the header totals
    pub fn unrecord_payment(&mut self, amount: Money, now: DateTime<Utc>) {
        self.paid_amount = self.paid_amount - amount;
        self.pending_amount = self.pending_amount + amount;
        self.refresh_status(now);
    }

    /// Voids the document; only documents with no applied payments qualify
    pub fn void(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), BillingError> {
        if matches!(self.status, PayableStatus::Voided) {
            return Err(BillingError::DocumentVoided);
        }
        if self.paid_amount.is_positive() {
            return Err(BillingError::AlreadyPaid);
        }
        self.status = PayableStatus::Voided;
        self.voided_at = Some(now);
        self.void_reason = reason;
        Ok(())
    }
}

/// An unissued payable produced by the settlement cycle
#[derive(Debug, Clone)]
pub struct PayableDraft {
    pub provider_id: ProviderId,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub gross_total: Money,
    pub commission_total: Money,
    pub net_total: Money,
    pub notes: Option<String>,
    pub details: Vec<PayableDraftDetail>,
}

/// A detail row of a draft payable
#[derive(Debug, Clone)]
pub struct PayableDraftDetail {
    pub consumption_id: ConsumptionId,
    pub gross_amount: Money,
    pub commission_amount: Money,
    pub net_amount: Money,
}

/// An issued payable as returned by the store
#[derive(Debug, Clone)]
pub struct IssuedPayable {
    pub document_id: PayableDocumentId,
    pub document_number: DocumentNumber,
    pub gross_total: Money,
    pub commission_total: Money,
    pub net_total: Money,
    pub detail_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbering::DocumentSeries;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn document(net: &str) -> PayableDocument {
        let now = Utc::now();
        let net = Money::new(net.parse().unwrap());
        PayableDocument {
            id: PayableDocumentId::new_v7(),
            provider_id: ProviderId::new(),
            document_number: DocumentNumber::format(DocumentSeries::Payable, 2026, 1),
            period_from: now - Duration::days(30),
            period_to: now,
            issued_at: now,
            due_date: now + Duration::days(PAYABLE_TERM_DAYS),
            gross_total: net + Money::new(dec!(50)),
            commission_total: Money::new(dec!(50)),
            net_total: net,
            paid_amount: Money::zero(),
            pending_amount: net,
            status: PayableStatus::Pending,
            voided_at: None,
            void_reason: None,
            notes: None,
        }
    }

    #[test]
    fn test_payments_settle_net_total() {
        let mut doc = document("950");
        let now = Utc::now();

        doc.record_payment(Money::new(dec!(950)), now);
        assert_eq!(doc.status, PayableStatus::Paid);
        assert!(doc.pending_amount.is_zero());
        // gross and commission untouched by payments
        assert_eq!(doc.gross_total, Money::new(dec!(1000)));
        assert_eq!(doc.commission_total, Money::new(dec!(50)));
    }

    #[test]
    fn test_void_rejected_after_payment() {
        let mut doc = document("500");
        let now = Utc::now();
        doc.record_payment(Money::new(dec!(100)), now);
        assert!(matches!(doc.void(None, now), Err(BillingError::AlreadyPaid)));
    }

    #[test]
    fn test_unrecord_restores_pending() {
        let mut doc = document("500");
        let now = Utc::now();
        doc.record_payment(Money::new(dec!(500)), now);
        assert_eq!(doc.status, PayableStatus::Paid);

        doc.unrecord_payment(Money::new(dec!(500)), now);
        assert_eq!(doc.pending_amount, Money::new(dec!(500)));
        assert_eq!(doc.status, PayableStatus::Pending);
    }
}
