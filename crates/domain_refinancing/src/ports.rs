//! Refinancing store port

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{ClientId, DomainPort, Money, PortError, ReceivableDocumentId, RefinancingId};
use domain_billing::{DocumentNumber, ReceivableDocument};

use crate::debt::RefinancingDebt;
use crate::service::{RefinancingPaymentPlan, RefinancingPlan, WriteOffPlan};

/// An issued refinancing as returned by the store
#[derive(Debug, Clone)]
pub struct IssuedRefinancing {
    pub refinancing_id: RefinancingId,
    pub refinancing_number: DocumentNumber,
    pub original_amount: Money,
    pub due_date: DateTime<Utc>,
    /// Clients whose balances were restored, with the credited amounts
    pub restored: Vec<(ClientId, Money)>,
}

/// Persistence port for the refinancing domain
///
/// `create_refinancing` is the big composite write: allocate the `REF`
/// number, insert the debt, flip the source document to `Refinanced` and
/// credit every billed client, all in one transaction. The adapter locks the
/// source document row and fails with `Conflict` if another writer
/// refinanced or paid it first.
#[async_trait]
pub trait RefinancingStore: DomainPort {
    async fn find_receivable(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Option<ReceivableDocument>, PortError>;

    /// Per-client sums of the source document's detail rows
    async fn billed_amounts_by_client(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Vec<(ClientId, Money)>, PortError>;

    /// Atomically creates the debt, marks the source refinanced and restores
    /// client balances capped at their granted limits
    async fn create_refinancing(
        &self,
        plan: &RefinancingPlan,
    ) -> Result<IssuedRefinancing, PortError>;

    async fn find_refinancing(
        &self,
        refinancing_id: RefinancingId,
    ) -> Result<Option<RefinancingDebt>, PortError>;

    /// Atomically records the payment, updates the debt totals and mirrors
    /// paid/pending onto the source document; when the plan settles the debt
    /// the source document moves to `Paid` as well
    async fn commit_refinancing_payment(
        &self,
        plan: &RefinancingPaymentPlan,
    ) -> Result<(), PortError>;

    /// Marks the debt written off; the lost amount stays on the record for
    /// reporting
    async fn commit_write_off(&self, plan: &WriteOffPlan) -> Result<(), PortError>;
}
