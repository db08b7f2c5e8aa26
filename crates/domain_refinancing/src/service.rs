//! Refinancing operations
//!
//! Creating a refinancing models "the company's debt moves elsewhere, the
//! employees are made whole immediately": the source document's pending
//! balance becomes the debt's principal, the document flips to `Refinanced`,
//! and every billed client gets their full billed amount back at once (not
//! proportional, unlike payment restoration). From then on collection
//! targets the debt; payments mirror onto the source document's totals and
//! settle it when the debt settles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use core_kernel::{
    ClientId, Clock, CompanyId, Money, ReceivableDocumentId, RefinancingId, UserId,
};
use domain_billing::{PaymentMethod, ReceivableStatus};

use crate::debt::RefinancingStatus;
use crate::error::RefinancingError;
use crate::ports::{IssuedRefinancing, RefinancingStore};

/// Request to refinance a receivable document
#[derive(Debug, Clone)]
pub struct CreateRefinancing {
    pub document_id: ReceivableDocumentId,
    pub new_due_date: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Request to pay against a refinancing debt
#[derive(Debug, Clone)]
pub struct ApplyRefinancingPayment {
    pub refinancing_id: RefinancingId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub registered_by: UserId,
}

/// The planned creation of a refinancing debt
#[derive(Debug, Clone)]
pub struct RefinancingPlan {
    pub document_id: ReceivableDocumentId,
    pub company_id: CompanyId,
    /// Pending balance absorbed from the source document
    pub original_amount: Money,
    pub due_date: DateTime<Utc>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Full billed amount per client; the adapter caps each at the limit
    pub restorations: Vec<(ClientId, Money)>,
}

/// The planned effect of a refinancing payment
#[derive(Debug, Clone)]
pub struct RefinancingPaymentPlan {
    pub refinancing_id: RefinancingId,
    pub document_id: ReceivableDocumentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub registered_by: UserId,
    pub paid_at: DateTime<Utc>,
    pub new_paid_amount: Money,
    pub new_pending_amount: Money,
    pub new_status: RefinancingStatus,
    /// Status the source document takes; `Paid` when the debt settles
    pub source_status: ReceivableStatus,
}

/// The planned write-off of a refinancing debt
#[derive(Debug, Clone)]
pub struct WriteOffPlan {
    pub refinancing_id: RefinancingId,
    /// Pending amount lost, kept for reporting
    pub lost_amount: Money,
    pub reason: Option<String>,
    pub written_off_at: DateTime<Utc>,
}

/// Creates, collects and writes off refinancing debts
pub struct RefinancingService<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: RefinancingStore> RefinancingService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Refinances a receivable document's outstanding balance
    ///
    /// Fails when the source is paid, voided or already refinanced, or has
    /// no pending balance.
    #[instrument(skip(self, request), fields(document_id = %request.document_id))]
    pub async fn create(
        &self,
        request: CreateRefinancing,
    ) -> Result<IssuedRefinancing, RefinancingError> {
        let now = self.clock.now();
        let mut document = self
            .store
            .find_receivable(request.document_id)
            .await?
            .ok_or(RefinancingError::DocumentNotFound(request.document_id))?;
        document.refresh_status(now);

        if matches!(document.status, ReceivableStatus::Voided) {
            return Err(RefinancingError::SourceVoided);
        }
        if document.refinanced {
            return Err(RefinancingError::AlreadyRefinanced);
        }
        if matches!(document.status, ReceivableStatus::Paid) {
            return Err(RefinancingError::SourceAlreadyPaid);
        }
        if !document.pending_amount.is_positive() {
            return Err(RefinancingError::NoPendingBalance);
        }

        let restorations = self.store.billed_amounts_by_client(document.id).await?;

        let plan = RefinancingPlan {
            document_id: document.id,
            company_id: document.company_id,
            original_amount: document.pending_amount,
            due_date: request.new_due_date,
            reason: request.reason,
            created_at: now,
            restorations,
        };

        let issued = self.store.create_refinancing(&plan).await?;
        info!(
            refinancing = %issued.refinancing_number,
            principal = %issued.original_amount,
            clients_restored = issued.restored.len(),
            "document refinanced"
        );
        Ok(issued)
    }

    /// Applies a payment to a refinancing debt
    ///
    /// Settling the debt propagates `Paid` to the source document; a partial
    /// payment keeps the source `Refinanced` while its totals track the
    /// debt.
    #[instrument(skip(self, request), fields(refinancing_id = %request.refinancing_id, amount = %request.amount))]
    pub async fn apply_payment(
        &self,
        request: ApplyRefinancingPayment,
    ) -> Result<RefinancingStatus, RefinancingError> {
        let now = self.clock.now();
        let mut debt = self
            .store
            .find_refinancing(request.refinancing_id)
            .await?
            .ok_or(RefinancingError::RefinancingNotFound(request.refinancing_id))?;
        debt.refresh_status(now);

        if debt.status.is_terminal() {
            if matches!(debt.status, RefinancingStatus::Paid) {
                return Err(RefinancingError::AlreadyPaid);
            }
            return Err(RefinancingError::InvalidTransition {
                from: debt.status,
                to: RefinancingStatus::PartiallyPaid,
            });
        }
        if !request.amount.is_positive() || request.amount > debt.pending_amount {
            return Err(RefinancingError::InvalidAmount {
                amount: request.amount,
                pending: debt.pending_amount,
            });
        }

        let new_paid = debt.paid_amount + request.amount;
        let new_pending = debt.pending_amount - request.amount;
        let new_status = RefinancingStatus::derive(new_paid, new_pending, debt.due_date, now);
        let source_status = if matches!(new_status, RefinancingStatus::Paid) {
            ReceivableStatus::Paid
        } else {
            ReceivableStatus::Refinanced
        };

        let plan = RefinancingPaymentPlan {
            refinancing_id: debt.id,
            document_id: debt.document_id,
            amount: request.amount,
            method: request.method,
            reference: request.reference,
            registered_by: request.registered_by,
            paid_at: now,
            new_paid_amount: new_paid,
            new_pending_amount: new_pending,
            new_status,
            source_status,
        };

        self.store.commit_refinancing_payment(&plan).await?;
        info!(status = ?new_status, pending = %new_pending, "refinancing payment applied");
        Ok(new_status)
    }

    /// Writes a refinancing debt off as uncollectable
    #[instrument(skip(self, reason), fields(refinancing_id = %refinancing_id))]
    pub async fn write_off(
        &self,
        refinancing_id: RefinancingId,
        reason: Option<String>,
    ) -> Result<Money, RefinancingError> {
        let now = self.clock.now();
        let mut debt = self
            .store
            .find_refinancing(refinancing_id)
            .await?
            .ok_or(RefinancingError::RefinancingNotFound(refinancing_id))?;
        debt.refresh_status(now);

        if !debt.status.can_transition_to(RefinancingStatus::WrittenOff) {
            return Err(RefinancingError::InvalidTransition {
                from: debt.status,
                to: RefinancingStatus::WrittenOff,
            });
        }

        let plan = WriteOffPlan {
            refinancing_id: debt.id,
            lost_amount: debt.pending_amount,
            reason,
            written_off_at: now,
        };

        self.store.commit_write_off(&plan).await?;
        info!(lost = %plan.lost_amount, "refinancing written off");
        Ok(plan.lost_amount)
    }
}
