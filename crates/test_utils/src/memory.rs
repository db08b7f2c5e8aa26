//! In-memory store implementing all three domain ports
//!
//! `InMemoryStore` mirrors the semantics the PostgreSQL adapters promise:
//! composite writes re-validate the invariants against current state and
//! fail with `PortError::Conflict` when a plan's snapshot went stale, and
//! document numbers come from per-(series, year) counters. State lives
//! behind one mutex, which stands in for the database's serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

use core_kernel::{
    CashboxId, ClientId, CompanyId, ConsumptionId, DetailId, DomainPort, Money,
    PayableDocumentId, PayablePaymentId, PortError, ProviderId, ReceivableDocumentId,
    ReceivablePaymentId, RefinancingId, RefinancingPaymentId, StoreId, UserId,
};
use domain_billing::ports::{BillableConsumption, BillableSettlement, BillingStore};
use domain_billing::{
    DocumentNumber, DocumentSeries, IssuedPayable, IssuedReceivable, PayableDetail,
    PayableDocument, PayableDraft, PayablePayment, PayablePaymentPlan, PayablePaymentReceipt,
    PayableStatus, PayableVoidPlan, ReceivableDetail, ReceivableDocument, ReceivableDraft,
    ReceivablePayment, ReceivablePaymentPlan, ReceivablePaymentReceipt, ReceivableStatus,
    ReceivableVoidPlan, RestorationEntry,
};
use domain_ledger::closure::{CashClosure, ClosureTotals};
use domain_ledger::ports::{LedgerStore, ReversalOutcome};
use domain_ledger::{
    Cashbox, Client, Company, Consumption, Provider, SaleContext, Store, UserAssignment,
};
use domain_refinancing::ports::{IssuedRefinancing, RefinancingStore};
use domain_refinancing::{
    RefinancingDebt, RefinancingPayment, RefinancingPaymentPlan, RefinancingPlan,
    RefinancingStatus, WriteOffPlan,
};

#[derive(Default)]
struct State {
    companies: HashMap<CompanyId, Company>,
    clients: HashMap<ClientId, Client>,
    providers: HashMap<ProviderId, Provider>,
    stores: HashMap<StoreId, Store>,
    cashboxes: HashMap<CashboxId, Cashbox>,
    assignments: Vec<UserAssignment>,
    consumptions: HashMap<ConsumptionId, Consumption>,
    closures: Vec<CashClosure>,
    receivables: HashMap<ReceivableDocumentId, ReceivableDocument>,
    receivable_details: Vec<ReceivableDetail>,
    receivable_payments: HashMap<ReceivablePaymentId, ReceivablePayment>,
    payables: HashMap<PayableDocumentId, PayableDocument>,
    payable_details: Vec<PayableDetail>,
    payable_payments: HashMap<PayablePaymentId, PayablePayment>,
    refinancings: HashMap<RefinancingId, RefinancingDebt>,
    refinancing_payments: Vec<RefinancingPayment>,
    sequences: HashMap<String, i64>,
}

/// In-memory adapter for `LedgerStore`, `BillingStore` and `RefinancingStore`
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, PortError> {
        self.state
            .lock()
            .map_err(|_| PortError::internal("state lock poisoned"))
    }

    // --- seeding -----------------------------------------------------------

    pub fn insert_company(&self, company: Company) {
        if let Ok(mut state) = self.state.lock() {
            state.companies.insert(company.id, company);
        }
    }

    pub fn insert_client(&self, client: Client) {
        if let Ok(mut state) = self.state.lock() {
            state.clients.insert(client.id, client);
        }
    }

    pub fn insert_provider(&self, provider: Provider) {
        if let Ok(mut state) = self.state.lock() {
            state.providers.insert(provider.id, provider);
        }
    }

    pub fn insert_store(&self, store: Store) {
        if let Ok(mut state) = self.state.lock() {
            state.stores.insert(store.id, store);
        }
    }

    pub fn insert_cashbox(&self, cashbox: Cashbox) {
        if let Ok(mut state) = self.state.lock() {
            state.cashboxes.insert(cashbox.id, cashbox);
        }
    }

    pub fn insert_assignment(&self, assignment: UserAssignment) {
        if let Ok(mut state) = self.state.lock() {
            state.assignments.push(assignment);
        }
    }

    /// Reads a client's current balance, for assertions
    pub fn client_balance(&self, client_id: ClientId) -> Option<Money> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.clients.get(&client_id).map(|c| c.balance))
    }

    /// Reads a receivable document's current snapshot, for assertions
    pub fn receivable(&self, document_id: ReceivableDocumentId) -> Option<ReceivableDocument> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.receivables.get(&document_id).cloned())
    }
}

impl DomainPort for InMemoryStore {}

fn allocate_number(state: &mut State, series: DocumentSeries, year: i32) -> DocumentNumber {
    let value = state
        .sequences
        .entry(series.counter_key(year))
        .and_modify(|v| *v += 1)
        .or_insert(1);
    DocumentNumber::format(series, year, *value as u32)
}

/// Credits a client's balance capped at the granted limit, returning the
/// amount actually credited
fn restore_capped(
    state: &mut State,
    client_id: ClientId,
    amount: Money,
    at: DateTime<Utc>,
) -> Result<Money, PortError> {
    let client = state
        .clients
        .get_mut(&client_id)
        .ok_or_else(|| PortError::not_found("Client", client_id))?;
    let restored = (client.balance + amount).min(client.original_limit) - client.balance;
    if restored.is_positive() {
        client.balance = client.balance + restored;
        client.updated_at = at;
    }
    Ok(restored)
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn load_sale_context(
        &self,
        cashbox_id: CashboxId,
    ) -> Result<Option<SaleContext>, PortError> {
        let state = self.lock()?;
        let Some(cashbox) = state.cashboxes.get(&cashbox_id) else {
            return Ok(None);
        };
        let store = state
            .stores
            .get(&cashbox.store_id)
            .ok_or_else(|| PortError::not_found("Store", cashbox.store_id))?;
        let provider = state
            .providers
            .get(&store.provider_id)
            .ok_or_else(|| PortError::not_found("Provider", store.provider_id))?;
        Ok(Some(SaleContext {
            provider: provider.clone(),
            store: store.clone(),
            cashbox: cashbox.clone(),
        }))
    }

    async fn assignments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserAssignment>, PortError> {
        let state = self.lock()?;
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn closure_exists(
        &self,
        user_id: UserId,
        cashbox_id: CashboxId,
        date: NaiveDate,
    ) -> Result<bool, PortError> {
        let state = self.lock()?;
        Ok(state.closures.iter().any(|c| {
            c.user_id == user_id && c.cashbox_id == cashbox_id && c.closure_date == date
        }))
    }

    async fn find_client(&self, client_id: ClientId) -> Result<Option<Client>, PortError> {
        Ok(self.lock()?.clients.get(&client_id).cloned())
    }

    async fn find_company(&self, company_id: CompanyId) -> Result<Option<Company>, PortError> {
        Ok(self.lock()?.companies.get(&company_id).cloned())
    }

    async fn company_consumed_total(&self, company_id: CompanyId) -> Result<Money, PortError> {
        let state = self.lock()?;
        Ok(state
            .consumptions
            .values()
            .filter(|c| c.company_id == company_id && !c.reversed)
            .fold(Money::zero(), |acc, c| acc + c.amount))
    }

    async fn commit_registration(&self, consumption: &Consumption) -> Result<Money, PortError> {
        let mut state = self.lock()?;

        let company_limit = state
            .companies
            .get(&consumption.company_id)
            .map(|c| c.credit_limit)
            .ok_or_else(|| PortError::not_found("Company", consumption.company_id))?;
        if !company_limit.is_zero() {
            let consumed = state
                .consumptions
                .values()
                .filter(|c| c.company_id == consumption.company_id && !c.reversed)
                .fold(Money::zero(), |acc, c| acc + c.amount);
            if consumed + consumption.amount > company_limit {
                return Err(PortError::conflict(format!(
                    "company limit exceeded: {consumed} consumed of {company_limit}"
                )));
            }
        }

        let client = state
            .clients
            .get_mut(&consumption.client_id)
            .ok_or_else(|| PortError::not_found("Client", consumption.client_id))?;
        if client.balance < consumption.amount {
            return Err(PortError::conflict(format!(
                "insufficient balance: {} available, {} requested",
                client.balance, consumption.amount
            )));
        }
        client.balance = client.balance - consumption.amount;
        client.updated_at = consumption.registered_at;
        let new_balance = client.balance;

        state
            .consumptions
            .insert(consumption.id, consumption.clone());
        Ok(new_balance)
    }

    async fn find_consumption(
        &self,
        id: ConsumptionId,
    ) -> Result<Option<Consumption>, PortError> {
        Ok(self.lock()?.consumptions.get(&id).cloned())
    }

    async fn commit_reversal(
        &self,
        id: ConsumptionId,
        reversed_by: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<ReversalOutcome, PortError> {
        let mut state = self.lock()?;

        let (client_id, amount) = {
            let consumption = state
                .consumptions
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Consumption", id))?;
            if consumption.reversed {
                return Err(PortError::conflict("consumption already reversed"));
            }
            consumption.reversed = true;
            consumption.reversed_at = Some(at);
            consumption.reversed_by = Some(reversed_by);
            consumption.reversal_reason = reason;
            (consumption.client_id, consumption.amount)
        };

        let restored = restore_capped(&mut state, client_id, amount, at)?;
        let new_balance = state
            .clients
            .get(&client_id)
            .map(|c| c.balance)
            .ok_or_else(|| PortError::not_found("Client", client_id))?;

        Ok(ReversalOutcome {
            amount_restored: restored,
            new_balance,
        })
    }

    async fn closure_totals(
        &self,
        user_id: UserId,
        cashbox_id: CashboxId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ClosureTotals, PortError> {
        let state = self.lock()?;
        let shift = state.consumptions.values().filter(|c| {
            c.registered_by == user_id
                && c.cashbox_id == cashbox_id
                && c.registered_at >= from
                && c.registered_at < to
        });
        Ok(ClosureTotals::aggregate(shift))
    }

    async fn insert_closure(&self, closure: &CashClosure) -> Result<(), PortError> {
        let mut state = self.lock()?;
        let exists = state.closures.iter().any(|c| {
            c.user_id == closure.user_id
                && c.cashbox_id == closure.cashbox_id
                && c.closure_date == closure.closure_date
        });
        if exists {
            return Err(PortError::conflict("closure already declared"));
        }
        state.closures.push(closure.clone());
        Ok(())
    }
}

fn receivable_duplicate(
    state: &State,
    company_id: CompanyId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> bool {
    state.receivables.values().any(|d| {
        d.company_id == company_id
            && d.period_from == from
            && d.period_to == to
            && !matches!(d.status, ReceivableStatus::Voided)
    })
}

fn consumption_billed(state: &State, consumption_id: ConsumptionId) -> bool {
    state.receivable_details.iter().any(|detail| {
        detail.consumption_id == consumption_id
            && state
                .receivables
                .get(&detail.document_id)
                .is_some_and(|d| !matches!(d.status, ReceivableStatus::Voided))
    })
}

fn consumption_settled(state: &State, consumption_id: ConsumptionId) -> bool {
    state.payable_details.iter().any(|detail| {
        detail.consumption_id == consumption_id
            && state
                .payables
                .get(&detail.document_id)
                .is_some_and(|d| !matches!(d.status, PayableStatus::Voided))
    })
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn find_company(&self, company_id: CompanyId) -> Result<Option<Company>, PortError> {
        Ok(self.lock()?.companies.get(&company_id).cloned())
    }

    async fn find_provider(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Provider>, PortError> {
        Ok(self.lock()?.providers.get(&provider_id).cloned())
    }

    async fn auto_cut_companies(&self) -> Result<Vec<Company>, PortError> {
        let state = self.lock()?;
        Ok(state
            .companies
            .values()
            .filter(|c| c.active && c.auto_cut)
            .cloned()
            .collect())
    }

    async fn active_receivable_exists(
        &self,
        company_id: CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool, PortError> {
        let state = self.lock()?;
        Ok(receivable_duplicate(&state, company_id, from, to))
    }

    async fn unbilled_consumptions(
        &self,
        company_id: CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BillableConsumption>, PortError> {
        let state = self.lock()?;
        let mut billable: Vec<_> = state
            .consumptions
            .values()
            .filter(|c| {
                c.company_id == company_id
                    && !c.reversed
                    && c.registered_at >= from
                    && c.registered_at < to
                    && !consumption_billed(&state, c.id)
            })
            .collect();
        billable.sort_by_key(|c| c.registered_at);
        Ok(billable
            .into_iter()
            .map(|c| BillableConsumption {
                consumption_id: c.id,
                client_id: c.client_id,
                amount: c.amount,
            })
            .collect())
    }

    async fn create_receivable(
        &self,
        draft: &ReceivableDraft,
    ) -> Result<IssuedReceivable, PortError> {
        let mut state = self.lock()?;

        if receivable_duplicate(&state, draft.company_id, draft.period_from, draft.period_to) {
            return Err(PortError::conflict("period already billed"));
        }

        let number = allocate_number(
            &mut state,
            DocumentSeries::Receivable,
            draft.issued_at.year(),
        );
        let document_id = ReceivableDocumentId::new_v7();

        state.receivables.insert(
            document_id,
            ReceivableDocument {
                id: document_id,
                company_id: draft.company_id,
                document_number: number.clone(),
                period_from: draft.period_from,
                period_to: draft.period_to,
                issued_at: draft.issued_at,
                due_date: draft.due_date,
                total_amount: draft.total_amount,
                paid_amount: Money::zero(),
                pending_amount: draft.total_amount,
                status: ReceivableStatus::Pending,
                refinanced: false,
                voided_at: None,
                void_reason: None,
                notes: draft.notes.clone(),
            },
        );
        for detail in &draft.details {
            state.receivable_details.push(ReceivableDetail {
                id: DetailId::new_v7(),
                document_id,
                consumption_id: detail.consumption_id,
                client_id: detail.client_id,
                amount: detail.amount,
            });
        }

        Ok(IssuedReceivable {
            document_id,
            document_number: number,
            total_amount: draft.total_amount,
            due_date: draft.due_date,
            detail_count: draft.details.len(),
        })
    }

    async fn active_payable_exists(
        &self,
        provider_id: ProviderId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool, PortError> {
        let state = self.lock()?;
        Ok(state.payables.values().any(|d| {
            d.provider_id == provider_id
                && d.period_from == from
                && d.period_to == to
                && !matches!(d.status, PayableStatus::Voided)
        }))
    }

    async fn unsettled_consumptions(
        &self,
        provider_id: ProviderId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BillableSettlement>, PortError> {
        let state = self.lock()?;
        let mut unsettled: Vec<_> = state
            .consumptions
            .values()
            .filter(|c| {
                c.provider_id == provider_id
                    && !c.reversed
                    && c.registered_at >= from
                    && c.registered_at < to
                    && !consumption_settled(&state, c.id)
            })
            .collect();
        unsettled.sort_by_key(|c| c.registered_at);
        Ok(unsettled
            .into_iter()
            .map(|c| BillableSettlement {
                consumption_id: c.id,
                gross_amount: c.amount,
                commission_amount: c.commission_amount,
                net_amount: c.net_provider_amount,
            })
            .collect())
    }

    async fn create_payable(&self, draft: &PayableDraft) -> Result<IssuedPayable, PortError> {
        let mut state = self.lock()?;

        let duplicate = state.payables.values().any(|d| {
            d.provider_id == draft.provider_id
                && d.period_from == draft.period_from
                && d.period_to == draft.period_to
                && !matches!(d.status, PayableStatus::Voided)
        });
        if duplicate {
            return Err(PortError::conflict("period already settled"));
        }

        let number =
            allocate_number(&mut state, DocumentSeries::Payable, draft.issued_at.year());
        let document_id = PayableDocumentId::new_v7();

        state.payables.insert(
            document_id,
            PayableDocument {
                id: document_id,
                provider_id: draft.provider_id,
                document_number: number.clone(),
                period_from: draft.period_from,
                period_to: draft.period_to,
                issued_at: draft.issued_at,
                due_date: draft.due_date,
                gross_total: draft.gross_total,
                commission_total: draft.commission_total,
                net_total: draft.net_total,
                paid_amount: Money::zero(),
                pending_amount: draft.net_total,
                status: PayableStatus::Pending,
                voided_at: None,
                void_reason: None,
                notes: draft.notes.clone(),
            },
        );
        for detail in &draft.details {
            state.payable_details.push(PayableDetail {
                id: DetailId::new_v7(),
                document_id,
                consumption_id: detail.consumption_id,
                gross_amount: detail.gross_amount,
                commission_amount: detail.commission_amount,
                net_amount: detail.net_amount,
            });
        }

        Ok(IssuedPayable {
            document_id,
            document_number: number,
            gross_total: draft.gross_total,
            commission_total: draft.commission_total,
            net_total: draft.net_total,
            detail_count: draft.details.len(),
        })
    }

    async fn find_receivable(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Option<ReceivableDocument>, PortError> {
        Ok(self.lock()?.receivables.get(&document_id).cloned())
    }

    async fn find_payable(
        &self,
        document_id: PayableDocumentId,
    ) -> Result<Option<PayableDocument>, PortError> {
        Ok(self.lock()?.payables.get(&document_id).cloned())
    }

    async fn billed_amounts_by_client(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Vec<(ClientId, Money)>, PortError> {
        let state = self.lock()?;
        let mut by_client: HashMap<ClientId, Money> = HashMap::new();
        for detail in state
            .receivable_details
            .iter()
            .filter(|d| d.document_id == document_id)
        {
            let entry = by_client.entry(detail.client_id).or_insert_with(Money::zero);
            *entry = *entry + detail.amount;
        }
        let mut billed: Vec<_> = by_client.into_iter().collect();
        billed.sort_by_key(|(client_id, _)| *client_id);
        Ok(billed)
    }

    async fn commit_receivable_payment(
        &self,
        plan: &ReceivablePaymentPlan,
    ) -> Result<ReceivablePaymentReceipt, PortError> {
        let mut state = self.lock()?;

        {
            let document = state
                .receivables
                .get(&plan.document_id)
                .ok_or_else(|| PortError::not_found("ReceivableDocument", plan.document_id))?;
            if document.refinanced
                || matches!(document.status, ReceivableStatus::Voided)
                || document.pending_amount != plan.new_pending_amount + plan.amount
            {
                return Err(PortError::conflict("document changed concurrently"));
            }
        }

        let receipt_number = allocate_number(
            &mut state,
            DocumentSeries::ReceivableReceipt,
            plan.paid_at.year(),
        );
        let payment_id = ReceivablePaymentId::new_v7();
        state.receivable_payments.insert(
            payment_id,
            ReceivablePayment {
                id: payment_id,
                document_id: plan.document_id,
                receipt_number: receipt_number.clone(),
                amount: plan.amount,
                method: plan.method,
                reference: plan.reference.clone(),
                registered_by: plan.registered_by,
                paid_at: plan.paid_at,
                voided: false,
                voided_at: None,
                void_reason: None,
            },
        );

        if let Some(document) = state.receivables.get_mut(&plan.document_id) {
            document.paid_amount = plan.new_paid_amount;
            document.pending_amount = plan.new_pending_amount;
            document.status = plan.new_status;
        }

        let mut restored = Vec::with_capacity(plan.restorations.len());
        for entry in &plan.restorations {
            let credited = restore_capped(&mut state, entry.client_id, entry.amount, plan.paid_at)?;
            restored.push(RestorationEntry {
                client_id: entry.client_id,
                amount: credited,
            });
        }

        Ok(ReceivablePaymentReceipt {
            payment_id,
            receipt_number,
            amount: plan.amount,
            document_status: plan.new_status,
            restored,
        })
    }

    async fn commit_payable_payment(
        &self,
        plan: &PayablePaymentPlan,
    ) -> Result<PayablePaymentReceipt, PortError> {
        let mut state = self.lock()?;

        {
            let document = state
                .payables
                .get(&plan.document_id)
                .ok_or_else(|| PortError::not_found("PayableDocument", plan.document_id))?;
            if matches!(document.status, PayableStatus::Voided)
                || document.pending_amount != plan.new_pending_amount + plan.amount
            {
                return Err(PortError::conflict("document changed concurrently"));
            }
        }

        let receipt_number = allocate_number(
            &mut state,
            DocumentSeries::PayableReceipt,
            plan.paid_at.year(),
        );
        let payment_id = PayablePaymentId::new_v7();
        state.payable_payments.insert(
            payment_id,
            PayablePayment {
                id: payment_id,
                document_id: plan.document_id,
                receipt_number: receipt_number.clone(),
                amount: plan.amount,
                method: plan.method,
                reference: plan.reference.clone(),
                registered_by: plan.registered_by,
                paid_at: plan.paid_at,
                voided: false,
                voided_at: None,
                void_reason: None,
            },
        );

        if let Some(document) = state.payables.get_mut(&plan.document_id) {
            document.paid_amount = plan.new_paid_amount;
            document.pending_amount = plan.new_pending_amount;
            document.status = plan.new_status;
        }

        Ok(PayablePaymentReceipt {
            payment_id,
            receipt_number,
            amount: plan.amount,
            document_status: plan.new_status,
        })
    }

    async fn find_receivable_payment(
        &self,
        payment_id: ReceivablePaymentId,
    ) -> Result<Option<(ReceivablePayment, ReceivableDocument)>, PortError> {
        let state = self.lock()?;
        let Some(payment) = state.receivable_payments.get(&payment_id).cloned() else {
            return Ok(None);
        };
        let document = state
            .receivables
            .get(&payment.document_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("ReceivableDocument", payment.document_id))?;
        Ok(Some((payment, document)))
    }

    async fn find_payable_payment(
        &self,
        payment_id: PayablePaymentId,
    ) -> Result<Option<(PayablePayment, PayableDocument)>, PortError> {
        let state = self.lock()?;
        let Some(payment) = state.payable_payments.get(&payment_id).cloned() else {
            return Ok(None);
        };
        let document = state
            .payables
            .get(&payment.document_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("PayableDocument", payment.document_id))?;
        Ok(Some((payment, document)))
    }

    async fn commit_void_receivable_payment(
        &self,
        plan: &ReceivableVoidPlan,
    ) -> Result<(), PortError> {
        let mut state = self.lock()?;

        let payment = state
            .receivable_payments
            .get_mut(&plan.payment_id)
            .ok_or_else(|| PortError::not_found("ReceivablePayment", plan.payment_id))?;
        if payment.voided {
            return Err(PortError::conflict("payment already voided"));
        }
        payment.voided = true;
        payment.voided_at = Some(plan.voided_at);
        payment.void_reason = plan.reason.clone();

        if let Some(document) = state.receivables.get_mut(&plan.document_id) {
            document.paid_amount = plan.new_paid_amount;
            document.pending_amount = plan.new_pending_amount;
            document.status = plan.new_status;
        }
        Ok(())
    }

    async fn commit_void_payable_payment(
        &self,
        plan: &PayableVoidPlan,
    ) -> Result<(), PortError> {
        let mut state = self.lock()?;

        let payment = state
            .payable_payments
            .get_mut(&plan.payment_id)
            .ok_or_else(|| PortError::not_found("PayablePayment", plan.payment_id))?;
        if payment.voided {
            return Err(PortError::conflict("payment already voided"));
        }
        payment.voided = true;
        payment.voided_at = Some(plan.voided_at);
        payment.void_reason = plan.reason.clone();

        if let Some(document) = state.payables.get_mut(&plan.document_id) {
            document.paid_amount = plan.new_paid_amount;
            document.pending_amount = plan.new_pending_amount;
            document.status = plan.new_status;
        }
        Ok(())
    }

    async fn commit_receivable_void(
        &self,
        document_id: ReceivableDocumentId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        let mut state = self.lock()?;
        let document = state
            .receivables
            .get_mut(&document_id)
            .ok_or_else(|| PortError::not_found("ReceivableDocument", document_id))?;
        if document.refinanced
            || matches!(document.status, ReceivableStatus::Voided)
            || document.paid_amount.is_positive()
        {
            return Err(PortError::conflict("document is not voidable"));
        }
        document.status = ReceivableStatus::Voided;
        document.voided_at = Some(at);
        document.void_reason = reason;
        Ok(())
    }
}

#[async_trait]
impl RefinancingStore for InMemoryStore {
    async fn find_receivable(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Option<ReceivableDocument>, PortError> {
        Ok(self.lock()?.receivables.get(&document_id).cloned())
    }

    async fn billed_amounts_by_client(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Vec<(ClientId, Money)>, PortError> {
        BillingStore::billed_amounts_by_client(self, document_id).await
    }

    async fn create_refinancing(
        &self,
        plan: &RefinancingPlan,
    ) -> Result<IssuedRefinancing, PortError> {
        let mut state = self.lock()?;

        {
            let document = state
                .receivables
                .get(&plan.document_id)
                .ok_or_else(|| PortError::not_found("ReceivableDocument", plan.document_id))?;
            if document.refinanced
                || matches!(document.status, ReceivableStatus::Voided)
                || document.pending_amount != plan.original_amount
            {
                return Err(PortError::conflict("document changed concurrently"));
            }
        }

        let number = allocate_number(
            &mut state,
            DocumentSeries::Refinancing,
            plan.created_at.year(),
        );
        let refinancing_id = RefinancingId::new_v7();
        state.refinancings.insert(
            refinancing_id,
            RefinancingDebt {
                id: refinancing_id,
                document_id: plan.document_id,
                company_id: plan.company_id,
                refinancing_number: number.clone(),
                original_amount: plan.original_amount,
                paid_amount: Money::zero(),
                pending_amount: plan.original_amount,
                due_date: plan.due_date,
                status: RefinancingStatus::Pending,
                reason: plan.reason.clone(),
                created_at: plan.created_at,
                written_off_at: None,
                write_off_reason: None,
            },
        );

        if let Some(document) = state.receivables.get_mut(&plan.document_id) {
            document.mark_refinanced();
        }

        let mut restored = Vec::with_capacity(plan.restorations.len());
        for (client_id, amount) in &plan.restorations {
            let credited = restore_capped(&mut state, *client_id, *amount, plan.created_at)?;
            restored.push((*client_id, credited));
        }

        Ok(IssuedRefinancing {
            refinancing_id,
            refinancing_number: number,
            original_amount: plan.original_amount,
            due_date: plan.due_date,
            restored,
        })
    }

    async fn find_refinancing(
        &self,
        refinancing_id: RefinancingId,
    ) -> Result<Option<RefinancingDebt>, PortError> {
        Ok(self.lock()?.refinancings.get(&refinancing_id).cloned())
    }

    async fn commit_refinancing_payment(
        &self,
        plan: &RefinancingPaymentPlan,
    ) -> Result<(), PortError> {
        let mut state = self.lock()?;

        {
            let debt = state
                .refinancings
                .get(&plan.refinancing_id)
                .ok_or_else(|| PortError::not_found("RefinancingDebt", plan.refinancing_id))?;
            let terminal = matches!(
                debt.status,
                RefinancingStatus::Paid
                    | RefinancingStatus::WrittenOff
                    | RefinancingStatus::Voided
            );
            if terminal || debt.pending_amount != plan.new_pending_amount + plan.amount {
                return Err(PortError::conflict("debt changed concurrently"));
            }
        }

        state.refinancing_payments.push(RefinancingPayment {
            id: RefinancingPaymentId::new_v7(),
            refinancing_id: plan.refinancing_id,
            amount: plan.amount,
            method: plan.method,
            reference: plan.reference.clone(),
            registered_by: plan.registered_by,
            paid_at: plan.paid_at,
        });

        if let Some(debt) = state.refinancings.get_mut(&plan.refinancing_id) {
            debt.paid_amount = plan.new_paid_amount;
            debt.pending_amount = plan.new_pending_amount;
            debt.status = plan.new_status;
        }
        if let Some(document) = state.receivables.get_mut(&plan.document_id) {
            document.paid_amount = document.paid_amount + plan.amount;
            document.pending_amount = document.pending_amount - plan.amount;
            document.status = plan.source_status;
        }
        Ok(())
    }

    async fn commit_write_off(&self, plan: &WriteOffPlan) -> Result<(), PortError> {
        let mut state = self.lock()?;
        let debt = state
            .refinancings
            .get_mut(&plan.refinancing_id)
            .ok_or_else(|| PortError::not_found("RefinancingDebt", plan.refinancing_id))?;
        let writable = matches!(
            debt.status,
            RefinancingStatus::Pending
                | RefinancingStatus::PartiallyPaid
                | RefinancingStatus::Overdue
        );
        if !writable {
            return Err(PortError::conflict("debt is not in a writable-off state"));
        }
        debt.status = RefinancingStatus::WrittenOff;
        debt.written_off_at = Some(plan.written_off_at);
        debt.write_off_reason = plan.reason.clone();
        Ok(())
    }
}
