//! Receivable documents (company billing)
//!
//! A receivable document freezes one billing period for one company: a
//! header with the period, totals and due date, plus one detail row per
//! billed consumption. Detail rows are what mark a consumption as billed;
//! a consumption with a detail row on a non-voided document is never picked
//! up by a later cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    ClientId, CompanyId, ConsumptionId, DetailId, Money, ReceivableDocumentId,
};

use crate::error::BillingError;
use crate::numbering::DocumentNumber;

/// Lifecycle states of a receivable document
///
/// `Paid`, `Overdue`, `PartiallyPaid` and `Pending` are derived from the
/// amounts and the due date; `Refinanced` and `Voided` are sticky overrides
/// set by their respective operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivableStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    Refinanced,
    Voided,
}

impl ReceivableStatus {
    /// Derives the non-overridden status from amounts and the clock
    pub fn derive(
        paid: Money,
        pending: Money,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if !pending.is_positive() {
            ReceivableStatus::Paid
        } else if paid.is_positive() {
            ReceivableStatus::PartiallyPaid
        } else if due_date < now {
            ReceivableStatus::Overdue
        } else {
            ReceivableStatus::Pending
        }
    }

    /// Whether payments may still be applied in this state
    pub fn accepts_payments(&self) -> bool {
        matches!(
            self,
            ReceivableStatus::Pending
                | ReceivableStatus::PartiallyPaid
                | ReceivableStatus::Overdue
        )
    }
}

/// One billed consumption inside a receivable document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivableDetail {
    pub id: DetailId,
    pub document_id: ReceivableDocumentId,
    /// The consumption this row bills; unique across non-voided documents
    pub consumption_id: ConsumptionId,
    /// Client who spent, kept for proportional restoration on payment
    pub client_id: ClientId,
    pub amount: Money,
}

/// A receivable document issued to a company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivableDocument {
    pub id: ReceivableDocumentId,
    pub company_id: CompanyId,
    /// Sequential number in the `CXC` series
    pub document_number: DocumentNumber,
    /// Billed period, half-open `[from, to)`
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    /// `issued_at` plus the company grace period
    pub due_date: DateTime<Utc>,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub status: ReceivableStatus,
    /// Set when a refinancing absorbed the pending balance
    pub refinanced: bool,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub notes: Option<String>,
}

impl ReceivableDocument {
    /// Recomputes the derived status; sticky overrides are left alone
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        if self.refinanced {
            self.status = ReceivableStatus::Refinanced;
            return;
        }
        if matches!(self.status, ReceivableStatus::Voided) {
            return;
        }
        self.status =
            ReceivableStatus::derive(self.paid_amount, self.pending_amount, self.due_date, now);
    }

    /// Applies a payment amount to the header totals
    ///
    /// The caller (payment planner) has already validated the amount against
    /// the pending balance and the document state.
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

    /// Checks that the document can be voided
    ///
    /// Only documents with no applied payments and no refinancing can be
    /// voided; their consumptions become billable again.
    pub fn ensure_voidable(&self) -> Result<(), BillingError> {
        if matches!(self.status, ReceivableStatus::Voided) {
            return Err(BillingError::DocumentVoided);
        }
        if self.refinanced {
            return Err(BillingError::AlreadyRefinanced);
        }
        if self.paid_amount.is_positive() {
            return Err(BillingError::AlreadyPaid);
        }
        Ok(())
    }

    /// Voids the document
    pub fn void(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), BillingError> {
        self.ensure_voidable()?;
        self.status = ReceivableStatus::Voided;
        self.voided_at = Some(now);
        self.void_reason = reason;
        Ok(())
    }

    /// Marks the document as absorbed by a refinancing
    pub fn mark_refinanced(&mut self) {
        self.refinanced = true;
        self.status = ReceivableStatus::Refinanced;
    }
}

/// An unissued receivable produced by the billing cycle
///
/// The store adapter allocates the document number and the identifier
/// inside the issuing transaction.
#[derive(Debug, Clone)]
pub struct ReceivableDraft {
    pub company_id: CompanyId,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub total_amount: Money,
    pub notes: Option<String>,
    pub details: Vec<DraftDetail>,
}

/// A detail row of a draft document
#[derive(Debug, Clone)]
pub struct DraftDetail {
    pub consumption_id: ConsumptionId,
    pub client_id: ClientId,
    pub amount: Money,
}

/// An issued receivable as returned by the store
#[derive(Debug, Clone)]
pub struct IssuedReceivable {
    pub document_id: ReceivableDocumentId,
    pub document_number: DocumentNumber,
    pub total_amount: Money,
    pub due_date: DateTime<Utc>,
    pub detail_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbering::DocumentSeries;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn document(total: &str, due_in_days: i64) -> ReceivableDocument {
        let now = Utc::now();
        let total = Money::new(total.parse().unwrap());
        ReceivableDocument {
            id: ReceivableDocumentId::new_v7(),
            company_id: CompanyId::new(),
            document_number: DocumentNumber::format(DocumentSeries::Receivable, 2026, 1),
            period_from: now - Duration::days(30),
            period_to: now,
            issued_at: now,
            due_date: now + Duration::days(due_in_days),
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

    #[test]
    fn test_status_derivation() {
        let now = Utc::now();
        let due = now + Duration::days(10);

        let derive = |paid: &str, pending: &str| {
            ReceivableStatus::derive(
                Money::new(paid.parse().unwrap()),
                Money::new(pending.parse().unwrap()),
                due,
                now,
            )
        };
        assert_eq!(derive("0", "1000"), ReceivableStatus::Pending);
        assert_eq!(derive("400", "600"), ReceivableStatus::PartiallyPaid);
        assert_eq!(derive("1000", "0"), ReceivableStatus::Paid);

        // overdue only when untouched and past due
        let overdue = ReceivableStatus::derive(
            Money::zero(),
            Money::new(dec!(1000)),
            now - Duration::days(1),
            now,
        );
        assert_eq!(overdue, ReceivableStatus::Overdue);
    }

    #[test]
    fn test_partial_payment_wins_over_overdue() {
        let now = Utc::now();
        let status = ReceivableStatus::derive(
            Money::new(dec!(100)),
            Money::new(dec!(900)),
            now - Duration::days(5),
            now,
        );
        assert_eq!(status, ReceivableStatus::PartiallyPaid);
    }

    #[test]
    fn test_record_payment_updates_totals() {
        let mut doc = document("1000", 10);
        let now = Utc::now();

        doc.record_payment(Money::new(dec!(400)), now);
        assert_eq!(doc.paid_amount, Money::new(dec!(400)));
        assert_eq!(doc.pending_amount, Money::new(dec!(600)));
        assert_eq!(doc.status, ReceivableStatus::PartiallyPaid);

        doc.record_payment(Money::new(dec!(600)), now);
        assert_eq!(doc.status, ReceivableStatus::Paid);
        assert!(doc.pending_amount.is_zero());
    }

    #[test]
    fn test_void_requires_untouched_document() {
        let now = Utc::now();

        let mut paid = document("1000", 10);
        paid.record_payment(Money::new(dec!(1)), now);
        assert!(matches!(
            paid.void(None, now),
            Err(BillingError::AlreadyPaid)
        ));

        let mut refinanced = document("1000", 10);
        refinanced.mark_refinanced();
        assert!(matches!(
            refinanced.void(None, now),
            Err(BillingError::AlreadyRefinanced)
        ));

        let mut fresh = document("1000", 10);
        fresh.void(Some("issued in error".to_string()), now).unwrap();
        assert_eq!(fresh.status, ReceivableStatus::Voided);
        assert!(matches!(
            fresh.void(None, now),
            Err(BillingError::DocumentVoided)
        ));
    }

    #[test]
    fn test_refinanced_status_is_sticky() {
        let mut doc = document("1000", -5);
        doc.mark_refinanced();
        doc.refresh_status(Utc::now());
        assert_eq!(doc.status, ReceivableStatus::Refinanced);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::numbering::DocumentSeries;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    proptest! {
        // pending = total - paid after any sequence of partial payments
        #[test]
        fn payments_preserve_the_totals_identity(
            total_cents in 1i64..10_000_000i64,
            fractions in proptest::collection::vec(1u32..100u32, 0..20)
        ) {
            let now = Utc::now();
            let total = Money::new(Decimal::new(total_cents, 2));
            let mut doc = ReceivableDocument {
                id: ReceivableDocumentId::new_v7(),
                company_id: CompanyId::new(),
                document_number: DocumentNumber::format(DocumentSeries::Receivable, 2026, 1),
                period_from: now - Duration::days(30),
                period_to: now,
                issued_at: now,
                due_date: now + Duration::days(15),
                total_amount: total,
                paid_amount: Money::zero(),
                pending_amount: total,
                status: ReceivableStatus::Pending,
                refinanced: false,
                voided_at: None,
                void_reason: None,
                notes: None,
            };

            for pct in fractions {
                if doc.pending_amount.is_zero() {
                    break;
                }
                let amount = doc
                    .pending_amount
                    .multiply(Decimal::from(pct) / Decimal::from(100u32))
                    .min(doc.pending_amount);
                if !amount.is_positive() {
                    continue;
                }
                doc.record_payment(amount, now);

                prop_assert_eq!(doc.paid_amount + doc.pending_amount, doc.total_amount);
                prop_assert!(doc.pending_amount >= Money::zero());
            }
        }
    }
}
