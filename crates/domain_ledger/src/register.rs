//! Consumption registration, reversal and the cash closure gate
//!
//! These services orchestrate the validation pipeline over a `LedgerStore`.
//! All pure decisions (hierarchy match, assignment resolution, balance and
//! limit checks, commission split) run here against transaction-fresh reads;
//! the store adapter then commits the writes atomically, re-validating the
//! invariants under row locks so concurrent registrations cannot drive a
//! balance negative.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, instrument, warn};

use core_kernel::{
    CashboxId, CashClosureId, ClientId, Clock, CompanyId, ConsumptionId, Money, ProviderId,
    StoreId, Timezone, UserId,
};

use crate::closure::{CashClosure, ClosureTotals};
use crate::consumption::{Consumption, NewConsumption};
use crate::error::LedgerError;
use crate::network::resolve_assignment;
use crate::ports::LedgerStore;

/// Request to register a consumption
#[derive(Debug, Clone)]
pub struct RegisterConsumption {
    pub client_id: ClientId,
    pub provider_id: ProviderId,
    pub store_id: StoreId,
    pub cashbox_id: CashboxId,
    pub amount: Money,
    pub concept: Option<String>,
    pub reference: Option<String>,
    pub registered_by: UserId,
}

/// Result of a successful registration
#[derive(Debug, Clone, Copy)]
pub struct RegistrationReceipt {
    pub consumption_id: ConsumptionId,
    pub new_client_balance: Money,
}

/// Request to reverse a consumption
#[derive(Debug, Clone)]
pub struct ReverseConsumption {
    pub consumption_id: ConsumptionId,
    pub reversed_by: UserId,
    pub reason: Option<String>,
}

/// Result of a successful reversal
#[derive(Debug, Clone, Copy)]
pub struct ReversalReceipt {
    pub consumption_id: ConsumptionId,
    pub amount_restored: Money,
    pub new_client_balance: Money,
}

/// Request to declare a cash closure
#[derive(Debug, Clone)]
pub struct CloseCashbox {
    pub user_id: UserId,
    pub cashbox_id: CashboxId,
    pub company_id: Option<CompanyId>,
    pub notes: Option<String>,
}

/// Result of a successful closure
#[derive(Debug, Clone)]
pub struct ClosureReceipt {
    pub closure_id: CashClosureId,
    pub totals: ClosureTotals,
}

/// Registers and reverses consumptions against the balance ledger
pub struct ConsumptionRegister<S> {
    store: S,
    timezone: Timezone,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> ConsumptionRegister<S> {
    pub fn new(store: S, timezone: Timezone, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            timezone,
            clock,
        }
    }

    /// Registers a consumption
    ///
    /// Validation order: amount, hierarchy, user assignment, closure gate,
    /// client and company state, client balance, company aggregate limit.
    /// The insert and the balance debit are committed in one transaction by
    /// the store.
    #[instrument(skip(self, request), fields(client_id = %request.client_id, cashbox_id = %request.cashbox_id))]
    pub async fn register(
        &self,
        request: RegisterConsumption,
    ) -> Result<RegistrationReceipt, LedgerError> {
        if !request.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(request.amount));
        }

        let context = self
            .store
            .load_sale_context(request.cashbox_id)
            .await?
            .ok_or(LedgerError::CashboxNotFound(request.cashbox_id))?;
        context.validate_against(request.provider_id, request.store_id, request.cashbox_id)?;

        let assignments = self.store.assignments_for_user(request.registered_by).await?;
        if resolve_assignment(
            &assignments,
            request.provider_id,
            request.store_id,
            request.cashbox_id,
        )
        .is_none()
        {
            warn!(user_id = %request.registered_by, "registration rejected: no covering assignment");
            return Err(LedgerError::Unauthorized {
                user_id: request.registered_by,
                cashbox_id: request.cashbox_id,
            });
        }

        let now = self.clock.now();
        let today = self.timezone.business_date(now);
        if self
            .store
            .closure_exists(request.registered_by, request.cashbox_id, today)
            .await?
        {
            return Err(LedgerError::CashboxClosed {
                user_id: request.registered_by,
                cashbox_id: request.cashbox_id,
                date: today,
            });
        }

        let client = self
            .store
            .find_client(request.client_id)
            .await?
            .ok_or(LedgerError::ClientNotFound(request.client_id))?;
        if !client.active {
            return Err(LedgerError::ClientInactive(client.id));
        }
        let company = self
            .store
            .find_company(client.company_id)
            .await?
            .ok_or(LedgerError::CompanyInactive(client.company_id))?;
        if !company.active {
            return Err(LedgerError::CompanyInactive(company.id));
        }

        if request.amount > client.balance {
            return Err(LedgerError::InsufficientBalance {
                available: client.balance,
                requested: request.amount,
            });
        }

        let consumed = self.store.company_consumed_total(company.id).await?;
        company.check_credit_limit(consumed, request.amount)?;

        let consumption = Consumption::register(
            NewConsumption {
                client_id: client.id,
                company_id: company.id,
                provider_id: request.provider_id,
                store_id: request.store_id,
                cashbox_id: request.cashbox_id,
                amount: request.amount,
                commission_percent: context.provider.commission_percent,
                concept: request.concept,
                reference: request.reference,
                registered_by: request.registered_by,
            },
            now,
        );

        let new_balance = self.store.commit_registration(&consumption).await?;

        info!(
            consumption_id = %consumption.id,
            amount = %consumption.amount,
            commission = %consumption.commission_amount,
            "consumption registered"
        );

        Ok(RegistrationReceipt {
            consumption_id: consumption.id,
            new_client_balance: new_balance,
        })
    }

    /// Reverses a consumption, restoring the client balance capped at the
    /// granted limit
    ///
    /// The caller is re-authorized against the consumption's own
    /// provider/store/cashbox, exactly as at registration time. If the
    /// consumption was already billed its amount stays on the issued
    /// document; reversal only excludes it from future cycles.
    #[instrument(skip(self, request), fields(consumption_id = %request.consumption_id))]
    pub async fn reverse(
        &self,
        request: ReverseConsumption,
    ) -> Result<ReversalReceipt, LedgerError> {
        let consumption = self
            .store
            .find_consumption(request.consumption_id)
            .await?
            .ok_or(LedgerError::ConsumptionNotFound(request.consumption_id))?;

        if consumption.reversed {
            return Err(LedgerError::AlreadyReversed(consumption.id));
        }

        let assignments = self.store.assignments_for_user(request.reversed_by).await?;
        if resolve_assignment(
            &assignments,
            consumption.provider_id,
            consumption.store_id,
            consumption.cashbox_id,
        )
        .is_none()
        {
            warn!(user_id = %request.reversed_by, "reversal rejected: no covering assignment");
            return Err(LedgerError::Unauthorized {
                user_id: request.reversed_by,
                cashbox_id: consumption.cashbox_id,
            });
        }

        let outcome = self
            .store
            .commit_reversal(
                consumption.id,
                request.reversed_by,
                request.reason,
                self.clock.now(),
            )
            .await?;

        info!(
            consumption_id = %consumption.id,
            restored = %outcome.amount_restored,
            "consumption reversed"
        );

        Ok(ReversalReceipt {
            consumption_id: consumption.id,
            amount_restored: outcome.amount_restored,
            new_client_balance: outcome.new_balance,
        })
    }
}

/// The per-(user, cashbox, day) closure lock
pub struct CashClosureGate<S> {
    store: S,
    timezone: Timezone,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> CashClosureGate<S> {
    pub fn new(store: S, timezone: Timezone, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            timezone,
            clock,
        }
    }

    /// Returns true iff no closure exists for `(user, cashbox, today)`
    pub async fn can_register(
        &self,
        user_id: UserId,
        cashbox_id: CashboxId,
    ) -> Result<bool, LedgerError> {
        let today = self.timezone.business_date(self.clock.now());
        Ok(!self.store.closure_exists(user_id, cashbox_id, today).await?)
    }

    /// Declares today's closure for the user's shift on a cashbox
    ///
    /// Aggregates the shift totals and inserts the closure row; the unique
    /// key on `(user, cashbox, date)` makes the lock idempotent per day.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, cashbox_id = %request.cashbox_id))]
    pub async fn close(&self, request: CloseCashbox) -> Result<ClosureReceipt, LedgerError> {
        let now = self.clock.now();
        let today = self.timezone.business_date(now);

        if self
            .store
            .closure_exists(request.user_id, request.cashbox_id, today)
            .await?
        {
            return Err(LedgerError::AlreadyClosed {
                user_id: request.user_id,
                cashbox_id: request.cashbox_id,
                date: today,
            });
        }

        let context = self
            .store
            .load_sale_context(request.cashbox_id)
            .await?
            .ok_or(LedgerError::CashboxNotFound(request.cashbox_id))?;

        let day_start = self.timezone.start_of_day(today);
        let day_end = day_start + Duration::days(1);
        let totals = self
            .store
            .closure_totals(request.user_id, request.cashbox_id, day_start, day_end)
            .await?;

        let closure = CashClosure::declare(
            request.user_id,
            request.cashbox_id,
            context.provider.id,
            context.store.id,
            request.company_id,
            today,
            now,
            totals.clone(),
            request.notes,
        );

        self.store.insert_closure(&closure).await?;

        info!(
            closure_id = %closure.id,
            count = closure.totals.consumption_count,
            total = %closure.totals.total_amount,
            "cashbox closed"
        );

        Ok(ClosureReceipt {
            closure_id: closure.id,
            totals: closure.totals,
        })
    }
}
