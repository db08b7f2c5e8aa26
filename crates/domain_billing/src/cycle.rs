//! Billing cycle generation
//!
//! A cycle turns a period's unbilled consumptions into one issued document:
//! receivables bill a company for its employees' spends, payables settle a
//! provider for the spends at its stores net of commission. Both sides run
//! the same pipeline: validate the period, reject overlap with an active
//! document, collect what is billable, and hand a draft to the store, which
//! allocates the sequential number and inserts everything in one
//! transaction.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use core_kernel::{Clock, CompanyId, Money, ProviderId};

use crate::error::BillingError;
use crate::payable::{IssuedPayable, PayableDraft, PayableDraftDetail, PAYABLE_TERM_DAYS};
use crate::ports::BillingStore;
use crate::receivable::{DraftDetail, IssuedReceivable, ReceivableDraft};

/// Request to generate a receivable document for a company
#[derive(Debug, Clone)]
pub struct GenerateReceivable {
    pub company_id: CompanyId,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Request to generate a payable document for a provider
#[derive(Debug, Clone)]
pub struct GeneratePayable {
    pub provider_id: ProviderId,
    pub period_from: DateTime<Utc>,
    pub period_to: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Generates receivable and payable documents over a `BillingStore`
pub struct BillingCycleService<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: BillingStore> BillingCycleService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Generates a receivable document billing a company for a period
    ///
    /// The due date is issuance plus the company's grace period. Fails with
    /// `DuplicatePeriod` when a non-voided document already overlaps the
    /// period and `NothingToBill` when every consumption in it is reversed
    /// or already billed.
    #[instrument(skip(self, request), fields(company_id = %request.company_id))]
    pub async fn generate_receivable(
        &self,
        request: GenerateReceivable,
    ) -> Result<IssuedReceivable, BillingError> {
        if request.period_to <= request.period_from {
            return Err(BillingError::InvalidPeriod {
                from: request.period_from,
                to: request.period_to,
            });
        }

        let company = self
            .store
            .find_company(request.company_id)
            .await?
            .ok_or(BillingError::CompanyNotFound(request.company_id))?;

        if self
            .store
            .active_receivable_exists(company.id, request.period_from, request.period_to)
            .await?
        {
            return Err(BillingError::DuplicatePeriod);
        }

        let billable = self
            .store
            .unbilled_consumptions(company.id, request.period_from, request.period_to)
            .await?;
        if billable.is_empty() {
            return Err(BillingError::NothingToBill);
        }

        let total: Money = billable.iter().map(|b| b.amount).sum();
        let issued_at = self.clock.now();
        let draft = ReceivableDraft {
            company_id: company.id,
            period_from: request.period_from,
            period_to: request.period_to,
            issued_at,
            due_date: issued_at + Duration::days(i64::from(company.grace_period_days)),
            total_amount: total,
            notes: request.notes,
            details: billable
                .into_iter()
                .map(|b| DraftDetail {
                    consumption_id: b.consumption_id,
                    client_id: b.client_id,
                    amount: b.amount,
                })
                .collect(),
        };

        let issued = self.store.create_receivable(&draft).await?;
        info!(
            document = %issued.document_number,
            total = %issued.total_amount,
            details = issued.detail_count,
            "receivable document issued"
        );
        Ok(issued)
    }

    /// Generates a payable document settling a provider for a period
    ///
    /// Totals are the sums of the consumptions' frozen gross / commission /
    /// net splits; the commission snapshot taken at registration is what
    /// settles, not the provider's current rate.
    #[instrument(skip(self, request), fields(provider_id = %request.provider_id))]
    pub async fn generate_payable(
        &self,
        request: GeneratePayable,
    ) -> Result<IssuedPayable, BillingError> {
        if request.period_to <= request.period_from {
            return Err(BillingError::InvalidPeriod {
                from: request.period_from,
                to: request.period_to,
            });
        }

        let provider = self
            .store
            .find_provider(request.provider_id)
            .await?
            .ok_or(BillingError::ProviderNotFound(request.provider_id))?;

        if self
            .store
            .active_payable_exists(provider.id, request.period_from, request.period_to)
            .await?
        {
            return Err(BillingError::DuplicatePeriod);
        }

        let billable = self
            .store
            .unsettled_consumptions(provider.id, request.period_from, request.period_to)
            .await?;
        if billable.is_empty() {
            return Err(BillingError::NothingToBill);
        }

        let gross: Money = billable.iter().map(|b| b.gross_amount).sum();
        let commission: Money = billable.iter().map(|b| b.commission_amount).sum();
        let net: Money = billable.iter().map(|b| b.net_amount).sum();

        let issued_at = self.clock.now();
        let draft = PayableDraft {
            provider_id: provider.id,
            period_from: request.period_from,
            period_to: request.period_to,
            issued_at,
            due_date: issued_at + Duration::days(PAYABLE_TERM_DAYS),
            gross_total: gross,
            commission_total: commission,
            net_total: net,
            notes: request.notes,
            details: billable
                .into_iter()
                .map(|b| PayableDraftDetail {
                    consumption_id: b.consumption_id,
                    gross_amount: b.gross_amount,
                    commission_amount: b.commission_amount,
                    net_amount: b.net_amount,
                })
                .collect(),
        };

        let issued = self.store.create_payable(&draft).await?;
        info!(
            document = %issued.document_number,
            net = %issued.net_total,
            commission = %issued.commission_total,
            "payable document issued"
        );
        Ok(issued)
    }
}
