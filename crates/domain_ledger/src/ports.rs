//! Ledger store port
//!
//! `LedgerStore` is the persistence seam for the ledger domain. Read methods
//! return transaction-fresh state; composite write methods are atomic and
//! must re-validate the balance/limit invariants under row-level locks before
//! committing, returning `PortError::Conflict` when a concurrent writer got
//! there first. The PostgreSQL adapter lives in `infra_db`; an in-memory
//! adapter with the same semantics lives in `test_utils`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::{
    CashboxId, ClientId, CompanyId, ConsumptionId, DomainPort, Money, PortError, UserId,
};

use crate::closure::{CashClosure, ClosureTotals};
use crate::client::Client;
use crate::company::Company;
use crate::consumption::Consumption;
use crate::network::{SaleContext, UserAssignment};

/// Result of committing a reversal
#[derive(Debug, Clone, Copy)]
pub struct ReversalOutcome {
    /// Amount actually credited back (capped at the client limit)
    pub amount_restored: Money,
    /// Client balance after restoration
    pub new_balance: Money,
}

/// Persistence port for the ledger domain
#[async_trait]
pub trait LedgerStore: DomainPort {
    /// Resolves the cashbox → store → provider chain for a cashbox
    async fn load_sale_context(
        &self,
        cashbox_id: CashboxId,
    ) -> Result<Option<SaleContext>, PortError>;

    /// All assignments granted to a user (active and inactive)
    async fn assignments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserAssignment>, PortError>;

    /// Whether a closure exists for `(user, cashbox, date)`
    async fn closure_exists(
        &self,
        user_id: UserId,
        cashbox_id: CashboxId,
        date: NaiveDate,
    ) -> Result<bool, PortError>;

    /// Loads a client
    async fn find_client(&self, client_id: ClientId) -> Result<Option<Client>, PortError>;

    /// Loads a company
    async fn find_company(&self, company_id: CompanyId) -> Result<Option<Company>, PortError>;

    /// Sum of the company's non-reversed consumption amounts
    async fn company_consumed_total(&self, company_id: CompanyId) -> Result<Money, PortError>;

    /// Atomically inserts the consumption and debits the client balance
    ///
    /// The adapter must lock the client row, re-validate
    /// `balance >= amount` and the company credit limit, and roll back
    /// entirely on violation (`Conflict`).
    ///
    /// # Returns
    ///
    /// The client balance after the debit.
    async fn commit_registration(&self, consumption: &Consumption) -> Result<Money, PortError>;

    /// Loads a consumption
    async fn find_consumption(
        &self,
        id: ConsumptionId,
    ) -> Result<Option<Consumption>, PortError>;

    /// Atomically marks a consumption reversed and restores the balance
    ///
    /// The reversal fields are write-once: the adapter must fail with
    /// `Conflict` if the row is already reversed. Restoration is capped at
    /// the client's `original_limit`.
    async fn commit_reversal(
        &self,
        id: ConsumptionId,
        reversed_by: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<ReversalOutcome, PortError>;

    /// Aggregates a user's shift totals on a cashbox over a UTC window
    ///
    /// The window is the business day `[start_of_day, start_of_next_day)`
    /// converted through the configured timezone by the caller.
    async fn closure_totals(
        &self,
        user_id: UserId,
        cashbox_id: CashboxId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ClosureTotals, PortError>;

    /// Inserts a closure; fails with `Conflict` if `(user, cashbox, date)`
    /// already exists
    async fn insert_closure(&self, closure: &CashClosure) -> Result<(), PortError>;
}
