//! Billing store port
//!
//! The persistence seam for billing. Issuing methods (`create_receivable`,
//! `create_payable`) allocate the sequential document number inside the
//! transaction, holding the per-series counter lock and a per-target lock so
//! concurrent cycles for the same company or provider serialize; a period
//! overlap detected under the lock surfaces as `Conflict`. Payment commits
//! re-check the document totals under a row lock before writing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{
    ClientId, CompanyId, ConsumptionId, DomainPort, Money, PayableDocumentId, PayablePaymentId,
    PortError, ProviderId, ReceivableDocumentId, ReceivablePaymentId,
};
use domain_ledger::{Company, Provider};

use crate::payable::{IssuedPayable, PayableDocument, PayableDraft};
use crate::payment::{
    PayablePayment, PayablePaymentPlan, PayablePaymentReceipt, PayableVoidPlan,
    ReceivablePayment, ReceivablePaymentPlan, ReceivablePaymentReceipt, ReceivableVoidPlan,
};
use crate::receivable::{IssuedReceivable, ReceivableDocument, ReceivableDraft};

/// A consumption eligible for company billing
#[derive(Debug, Clone)]
pub struct BillableConsumption {
    pub consumption_id: ConsumptionId,
    pub client_id: ClientId,
    pub amount: Money,
}

/// A consumption eligible for provider settlement
#[derive(Debug, Clone)]
pub struct BillableSettlement {
    pub consumption_id: ConsumptionId,
    pub gross_amount: Money,
    pub commission_amount: Money,
    pub net_amount: Money,
}

/// Persistence port for the billing domain
#[async_trait]
pub trait BillingStore: DomainPort {
    async fn find_company(&self, company_id: CompanyId) -> Result<Option<Company>, PortError>;

    async fn find_provider(&self, provider_id: ProviderId)
        -> Result<Option<Provider>, PortError>;

    /// Companies with the scheduled cut enabled
    async fn auto_cut_companies(&self) -> Result<Vec<Company>, PortError>;

    /// Whether a non-voided receivable exists for exactly this company and
    /// period
    async fn active_receivable_exists(
        &self,
        company_id: CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool, PortError>;

    /// Non-reversed consumptions in the period with no detail row on any
    /// non-voided receivable
    async fn unbilled_consumptions(
        &self,
        company_id: CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BillableConsumption>, PortError>;

    /// Atomically issues a receivable: allocates the `CXC` number, inserts
    /// the header and details
    async fn create_receivable(
        &self,
        draft: &ReceivableDraft,
    ) -> Result<IssuedReceivable, PortError>;

    /// Whether a non-voided payable exists for exactly this provider and
    /// period
    async fn active_payable_exists(
        &self,
        provider_id: ProviderId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool, PortError>;

    /// Non-reversed consumptions in the period with no detail row on any
    /// non-voided payable
    async fn unsettled_consumptions(
        &self,
        provider_id: ProviderId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BillableSettlement>, PortError>;

    /// Atomically issues a payable: allocates the `CXP` number, inserts the
    /// header and details
    async fn create_payable(&self, draft: &PayableDraft) -> Result<IssuedPayable, PortError>;

    async fn find_receivable(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Option<ReceivableDocument>, PortError>;

    async fn find_payable(
        &self,
        document_id: PayableDocumentId,
    ) -> Result<Option<PayableDocument>, PortError>;

    /// Per-client sums of a receivable's detail rows
    async fn billed_amounts_by_client(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Vec<(ClientId, Money)>, PortError>;

    /// Atomically commits a receivable payment: allocates the `REC` receipt
    /// number, inserts the payment, updates the header and credits each
    /// client capped at their granted limit
    ///
    /// The adapter re-reads the header under a row lock and fails with
    /// `Conflict` if the pending amount no longer covers the payment.
    async fn commit_receivable_payment(
        &self,
        plan: &ReceivablePaymentPlan,
    ) -> Result<ReceivablePaymentReceipt, PortError>;

    /// Atomically commits a payable payment with a `PRV` receipt number
    async fn commit_payable_payment(
        &self,
        plan: &PayablePaymentPlan,
    ) -> Result<PayablePaymentReceipt, PortError>;

    /// Loads a payment together with its document
    async fn find_receivable_payment(
        &self,
        payment_id: ReceivablePaymentId,
    ) -> Result<Option<(ReceivablePayment, ReceivableDocument)>, PortError>;

    async fn find_payable_payment(
        &self,
        payment_id: PayablePaymentId,
    ) -> Result<Option<(PayablePayment, PayableDocument)>, PortError>;

    /// Marks a payment voided and reopens the document balance
    async fn commit_void_receivable_payment(
        &self,
        plan: &ReceivableVoidPlan,
    ) -> Result<(), PortError>;

    async fn commit_void_payable_payment(&self, plan: &PayableVoidPlan)
        -> Result<(), PortError>;

    /// Voids an unpaid receivable document, freeing its consumptions for a
    /// future cycle
    async fn commit_receivable_void(
        &self,
        document_id: ReceivableDocumentId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), PortError>;
}
