//! Refinancing debts and their state machine
//!
//! A refinancing debt absorbs a receivable document's outstanding balance
//! under a new due date. It is 1:1 with its source document and tracks its
//! own paid/pending totals. `Pending`, `PartiallyPaid`, `Paid` and `Overdue`
//! derive from the amounts and the clock; `WrittenOff` and `Voided` are
//! terminal and set explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    CompanyId, Money, ReceivableDocumentId, RefinancingId, RefinancingPaymentId, UserId,
};
use domain_billing::{DocumentNumber, PaymentMethod};

use crate::error::RefinancingError;

/// Lifecycle states of a refinancing debt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinancingStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    WrittenOff,
    Voided,
}

impl RefinancingStatus {
    /// Derives the non-terminal status from amounts and the clock
    pub fn derive(
        paid: Money,
        pending: Money,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if !pending.is_positive() {
            RefinancingStatus::Paid
        } else if paid.is_positive() {
            RefinancingStatus::PartiallyPaid
        } else if due_date < now {
            RefinancingStatus::Overdue
        } else {
            RefinancingStatus::Pending
        }
    }

    /// Whether the state machine allows moving to `target`
    pub fn can_transition_to(&self, target: RefinancingStatus) -> bool {
        use RefinancingStatus::*;
        match (self, target) {
            (Pending, PartiallyPaid | Paid | Overdue | WrittenOff | Voided) => true,
            (PartiallyPaid, Paid | Overdue | WrittenOff) => true,
            // Overdue is derived Pending/PartiallyPaid past due; collection
            // and write-off stay open
            (Overdue, PartiallyPaid | Paid | WrittenOff) => true,
            _ => false,
        }
    }

    /// Terminal states accept no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefinancingStatus::Paid | RefinancingStatus::WrittenOff | RefinancingStatus::Voided
        )
    }
}

/// A company debt carved out of a receivable document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinancingDebt {
    pub id: RefinancingId,
    /// Source receivable; at most one active refinancing per document
    pub document_id: ReceivableDocumentId,
    pub company_id: CompanyId,
    /// Sequential number in the `REF` series
    pub refinancing_number: DocumentNumber,
    /// The pending balance absorbed from the source document
    pub original_amount: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub due_date: DateTime<Utc>,
    pub status: RefinancingStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub written_off_at: Option<DateTime<Utc>>,
    pub write_off_reason: Option<String>,
}

impl RefinancingDebt {
    /// Recomputes the derived status; terminal states are left alone
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = RefinancingStatus::derive(
            self.paid_amount,
            self.pending_amount,
            self.due_date,
            now,
        );
    }

    /// Applies a payment amount to the totals
    pub fn record_payment(&mut self, amount: Money, now: DateTime<Utc>) {
        self.paid_amount = self.paid_amount + amount;
        self.pending_amount = self.pending_amount - amount;
        self.refresh_status(now);
    }

    /// Writes the debt off as uncollectable
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` outside `Pending`/`PartiallyPaid`/
    /// `Overdue`.
    pub fn write_off(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), RefinancingError> {
        if !self.status.can_transition_to(RefinancingStatus::WrittenOff) {
            return Err(RefinancingError::InvalidTransition {
                from: self.status,
                to: RefinancingStatus::WrittenOff,
            });
        }
        self.status = RefinancingStatus::WrittenOff;
        self.written_off_at = Some(now);
        self.write_off_reason = reason;
        Ok(())
    }
}

/// A payment applied to a refinancing debt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinancingPayment {
    pub id: RefinancingPaymentId,
    pub refinancing_id: RefinancingId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub registered_by: UserId,
    pub paid_at: DateTime<Utc>,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::Duration;
    use domain_billing::DocumentSeries;
    use proptest::prelude::*;

    proptest! {
        // paid + pending == original across any sequence of installments,
        // and the derived status always matches the amounts
        #[test]
        fn installments_preserve_the_principal(
            principal_cents in 1i64..10_000_000i64,
            installment_cents in proptest::collection::vec(1i64..1_000_000i64, 0..20)
        ) {
            let now = Utc::now();
            let principal = Money::from_cents(principal_cents);
            let mut debt = RefinancingDebt {
                id: RefinancingId::new_v7(),
                document_id: ReceivableDocumentId::new_v7(),
                company_id: CompanyId::new(),
                refinancing_number:
                    DocumentNumber::format(DocumentSeries::Refinancing, 2026, 1),
                original_amount: principal,
                paid_amount: Money::zero(),
                pending_amount: principal,
                due_date: now + Duration::days(30),
                status: RefinancingStatus::Pending,
                reason: None,
                created_at: now,
                written_off_at: None,
                write_off_reason: None,
            };

            for cents in installment_cents {
                if debt.status.is_terminal() {
                    break;
                }
                let amount = Money::from_cents(cents).min(debt.pending_amount);
                if !amount.is_positive() {
                    continue;
                }
                debt.record_payment(amount, now);

                prop_assert_eq!(
                    debt.paid_amount + debt.pending_amount,
                    debt.original_amount
                );
                match debt.status {
                    RefinancingStatus::Paid => prop_assert!(debt.pending_amount.is_zero()),
                    RefinancingStatus::PartiallyPaid => {
                        prop_assert!(debt.paid_amount.is_positive());
                        prop_assert!(debt.pending_amount.is_positive());
                    }
                    other => prop_assert!(false, "unexpected status {other:?}"),
                }
            }
        }
    }
}
