//! PostgreSQL ledger store
//!
//! Implements `LedgerStore` against the relational schema. The composite
//! writes lock the client row with `SELECT ... FOR UPDATE` and serialize the
//! company aggregate check on a per-company advisory lock, re-validating the
//! balance and limit invariants inside the transaction; a failed re-check
//! rolls everything back and surfaces as `Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{
    CashboxId, ClientId, CompanyId, ConsumptionId, DomainPort, Money, PortError, Rate, UserId,
};
use domain_ledger::closure::{CashClosure, ClosureTotals};
use domain_ledger::ports::{LedgerStore, ReversalOutcome};
use domain_ledger::{
    Cashbox, Client, Company, Consumption, Provider, SaleContext, Store, UserAssignment,
};

use crate::error::sqlx_to_port;
use crate::locks::advisory_lock;

/// Advisory lock name serializing a company's aggregate limit check
pub(crate) fn company_lock(company_id: CompanyId) -> String {
    format!("company-exposure-{}", Uuid::from(company_id))
}

/// PostgreSQL-backed implementation of `LedgerStore`
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresLedgerStore {}

#[derive(FromRow)]
struct SaleContextRow {
    provider_id: Uuid,
    provider_name: String,
    commission_percent: Decimal,
    provider_active: bool,
    provider_created_at: DateTime<Utc>,
    store_id: Uuid,
    store_name: String,
    store_active: bool,
    cashbox_id: Uuid,
    cashbox_name: String,
    cashbox_active: bool,
}

impl From<SaleContextRow> for SaleContext {
    fn from(row: SaleContextRow) -> Self {
        SaleContext {
            provider: Provider {
                id: row.provider_id.into(),
                name: row.provider_name,
                commission_percent: Rate::from_percentage(row.commission_percent),
                active: row.provider_active,
                created_at: row.provider_created_at,
            },
            store: Store {
                id: row.store_id.into(),
                provider_id: row.provider_id.into(),
                name: row.store_name,
                active: row.store_active,
            },
            cashbox: Cashbox {
                id: row.cashbox_id.into(),
                store_id: row.store_id.into(),
                name: row.cashbox_name,
                active: row.cashbox_active,
            },
        }
    }
}

#[derive(FromRow)]
struct AssignmentRow {
    id: Uuid,
    user_id: Uuid,
    provider_id: Uuid,
    store_id: Option<Uuid>,
    cashbox_id: Option<Uuid>,
    active: bool,
}

impl From<AssignmentRow> for UserAssignment {
    fn from(row: AssignmentRow) -> Self {
        UserAssignment {
            id: row.id.into(),
            user_id: row.user_id.into(),
            provider_id: row.provider_id.into(),
            store_id: row.store_id.map(Into::into),
            cashbox_id: row.cashbox_id.map(Into::into),
            active: row.active,
        }
    }
}

#[derive(FromRow)]
struct ClientRow {
    id: Uuid,
    company_id: Uuid,
    full_name: String,
    balance: Decimal,
    original_limit: Decimal,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id.into(),
            company_id: row.company_id.into(),
            full_name: row.full_name,
            balance: Money::new(row.balance),
            original_limit: Money::new(row.original_limit),
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
pub(crate) struct CompanyRow {
    id: Uuid,
    name: String,
    credit_limit: Decimal,
    cut_day: i16,
    grace_period_days: i16,
    auto_cut: bool,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: row.id.into(),
            name: row.name,
            credit_limit: Money::new(row.credit_limit),
            cut_day: row.cut_day as u8,
            grace_period_days: row.grace_period_days as u16,
            auto_cut: row.auto_cut,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

pub(crate) const COMPANY_COLUMNS: &str =
    "id, name, credit_limit, cut_day, grace_period_days, auto_cut, active, created_at";

#[derive(FromRow)]
struct ConsumptionRow {
    id: Uuid,
    client_id: Uuid,
    company_id: Uuid,
    provider_id: Uuid,
    store_id: Uuid,
    cashbox_id: Uuid,
    amount: Decimal,
    commission_percent: Decimal,
    commission_amount: Decimal,
    net_provider_amount: Decimal,
    concept: Option<String>,
    reference: Option<String>,
    registered_by: Uuid,
    registered_at: DateTime<Utc>,
    reversed: bool,
    reversed_at: Option<DateTime<Utc>>,
    reversed_by: Option<Uuid>,
    reversal_reason: Option<String>,
}

impl From<ConsumptionRow> for Consumption {
    fn from(row: ConsumptionRow) -> Self {
        Consumption {
            id: row.id.into(),
            client_id: row.client_id.into(),
            company_id: row.company_id.into(),
            provider_id: row.provider_id.into(),
            store_id: row.store_id.into(),
            cashbox_id: row.cashbox_id.into(),
            amount: Money::new(row.amount),
            commission_percent: Rate::from_percentage(row.commission_percent),
            commission_amount: Money::new(row.commission_amount),
            net_provider_amount: Money::new(row.net_provider_amount),
            concept: row.concept,
            reference: row.reference,
            registered_by: row.registered_by.into(),
            registered_at: row.registered_at,
            reversed: row.reversed,
            reversed_at: row.reversed_at,
            reversed_by: row.reversed_by.map(Into::into),
            reversal_reason: row.reversal_reason,
        }
    }
}

#[derive(FromRow)]
struct TotalsRow {
    consumption_count: i64,
    reversed_count: i64,
    total_amount: Decimal,
    reversed_amount: Decimal,
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn load_sale_context(
        &self,
        cashbox_id: CashboxId,
    ) -> Result<Option<SaleContext>, PortError> {
        let row = sqlx::query_as::<_, SaleContextRow>(
            r#"
            SELECT p.id AS provider_id, p.name AS provider_name,
                   p.commission_percent, p.active AS provider_active,
                   p.created_at AS provider_created_at,
                   s.id AS store_id, s.name AS store_name, s.active AS store_active,
                   cb.id AS cashbox_id, cb.name AS cashbox_name, cb.active AS cashbox_active
            FROM cashboxes cb
            JOIN stores s ON s.id = cb.store_id
            JOIN providers p ON p.id = s.provider_id
            WHERE cb.id = $1
            "#,
        )
        .bind(Uuid::from(cashbox_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(row.map(Into::into))
    }

    async fn assignments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserAssignment>, PortError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            "SELECT id, user_id, provider_id, store_id, cashbox_id, active
             FROM user_assignments WHERE user_id = $1",
        )
        .bind(Uuid::from(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn closure_exists(
        &self,
        user_id: UserId,
        cashbox_id: CashboxId,
        date: NaiveDate,
    ) -> Result<bool, PortError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                 SELECT 1 FROM cash_closures
                 WHERE user_id = $1 AND cashbox_id = $2 AND closure_date = $3
             )",
        )
        .bind(Uuid::from(user_id))
        .bind(Uuid::from(cashbox_id))
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_to_port)
    }

    async fn find_client(&self, client_id: ClientId) -> Result<Option<Client>, PortError> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT id, company_id, full_name, balance, original_limit, active,
                    created_at, updated_at
             FROM clients WHERE id = $1",
        )
        .bind(Uuid::from(client_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(row.map(Into::into))
    }

    async fn find_company(&self, company_id: CompanyId) -> Result<Option<Company>, PortError> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(Uuid::from(company_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(row.map(Into::into))
    }

    async fn company_consumed_total(&self, company_id: CompanyId) -> Result<Money, PortError> {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM consumptions
             WHERE company_id = $1 AND NOT reversed",
        )
        .bind(Uuid::from(company_id))
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(Money::new(total))
    }

    #[instrument(skip(self, consumption), fields(consumption_id = %consumption.id))]
    async fn commit_registration(&self, consumption: &Consumption) -> Result<Money, PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        // lock the client row for the duration of the debit
        let client = sqlx::query_as::<_, ClientRow>(
            "SELECT id, company_id, full_name, balance, original_limit, active,
                    created_at, updated_at
             FROM clients WHERE id = $1 FOR UPDATE",
        )
        .bind(Uuid::from(consumption.client_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(sqlx_to_port)?
        .ok_or_else(|| PortError::not_found("Client", consumption.client_id))?;

        if Money::new(client.balance) < consumption.amount {
            return Err(PortError::conflict(format!(
                "insufficient balance: {} available, {} requested",
                Money::new(client.balance),
                consumption.amount
            )));
        }

        // re-check the company aggregate under the per-company lock
        advisory_lock(&mut tx, &company_lock(consumption.company_id)).await?;
        let credit_limit: Decimal =
            sqlx::query_scalar("SELECT credit_limit FROM companies WHERE id = $1")
                .bind(Uuid::from(consumption.company_id))
                .fetch_one(&mut *tx)
                .await
                .map_err(sqlx_to_port)?;
        if !credit_limit.is_zero() {
            let consumed: Decimal = sqlx::query_scalar(
                "SELECT COALESCE(SUM(amount), 0) FROM consumptions
                 WHERE company_id = $1 AND NOT reversed",
            )
            .bind(Uuid::from(consumption.company_id))
            .fetch_one(&mut *tx)
            .await
            .map_err(sqlx_to_port)?;
            if consumed + consumption.amount.amount() > credit_limit {
                return Err(PortError::conflict(format!(
                    "company limit exceeded: {consumed} consumed of {credit_limit}"
                )));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO consumptions (
                id, client_id, company_id, provider_id, store_id, cashbox_id,
                amount, commission_percent, commission_amount, net_provider_amount,
                concept, reference, registered_by, registered_at, reversed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, false)
            "#,
        )
        .bind(Uuid::from(consumption.id))
        .bind(Uuid::from(consumption.client_id))
        .bind(Uuid::from(consumption.company_id))
        .bind(Uuid::from(consumption.provider_id))
        .bind(Uuid::from(consumption.store_id))
        .bind(Uuid::from(consumption.cashbox_id))
        .bind(consumption.amount.amount())
        .bind(consumption.commission_percent.as_percentage())
        .bind(consumption.commission_amount.amount())
        .bind(consumption.net_provider_amount.amount())
        .bind(consumption.concept.as_deref())
        .bind(consumption.reference.as_deref())
        .bind(Uuid::from(consumption.registered_by))
        .bind(consumption.registered_at)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        let new_balance: Decimal = sqlx::query_scalar(
            "UPDATE clients SET balance = balance - $2, updated_at = $3
             WHERE id = $1 RETURNING balance",
        )
        .bind(Uuid::from(consumption.client_id))
        .bind(consumption.amount.amount())
        .bind(consumption.registered_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        tx.commit().await.map_err(sqlx_to_port)?;
        Ok(Money::new(new_balance))
    }

    async fn find_consumption(
        &self,
        id: ConsumptionId,
    ) -> Result<Option<Consumption>, PortError> {
        let row = sqlx::query_as::<_, ConsumptionRow>(
            "SELECT id, client_id, company_id, provider_id, store_id, cashbox_id,
                    amount, commission_percent, commission_amount, net_provider_amount,
                    concept, reference, registered_by, registered_at,
                    reversed, reversed_at, reversed_by, reversal_reason
             FROM consumptions WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, reason), fields(consumption_id = %id))]
    async fn commit_reversal(
        &self,
        id: ConsumptionId,
        reversed_by: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<ReversalOutcome, PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        let row = sqlx::query_as::<_, ConsumptionRow>(
            "SELECT id, client_id, company_id, provider_id, store_id, cashbox_id,
                    amount, commission_percent, commission_amount, net_provider_amount,
                    concept, reference, registered_by, registered_at,
                    reversed, reversed_at, reversed_by, reversal_reason
             FROM consumptions WHERE id = $1 FOR UPDATE",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(sqlx_to_port)?
        .ok_or_else(|| PortError::not_found("Consumption", id))?;

        if row.reversed {
            return Err(PortError::conflict("consumption already reversed"));
        }

        sqlx::query(
            "UPDATE consumptions
             SET reversed = true, reversed_at = $2, reversed_by = $3, reversal_reason = $4
             WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .bind(at)
        .bind(Uuid::from(reversed_by))
        .bind(reason.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        let client = sqlx::query_as::<_, ClientRow>(
            "SELECT id, company_id, full_name, balance, original_limit, active,
                    created_at, updated_at
             FROM clients WHERE id = $1 FOR UPDATE",
        )
        .bind(row.client_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        // restoration is capped at the granted limit
        let balance = Money::new(client.balance);
        let limit = Money::new(client.original_limit);
        let restored = (balance + Money::new(row.amount)).min(limit) - balance;

        let new_balance: Decimal = sqlx::query_scalar(
            "UPDATE clients SET balance = balance + $2, updated_at = $3
             WHERE id = $1 RETURNING balance",
        )
        .bind(row.client_id)
        .bind(restored.amount())
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        tx.commit().await.map_err(sqlx_to_port)?;
        Ok(ReversalOutcome {
            amount_restored: restored,
            new_balance: Money::new(new_balance),
        })
    }

    async fn closure_totals(
        &self,
        user_id: UserId,
        cashbox_id: CashboxId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ClosureTotals, PortError> {
        let row = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT COUNT(*) FILTER (WHERE NOT reversed) AS consumption_count,
                   COUNT(*) FILTER (WHERE reversed) AS reversed_count,
                   COALESCE(SUM(amount) FILTER (WHERE NOT reversed), 0) AS total_amount,
                   COALESCE(SUM(amount) FILTER (WHERE reversed), 0) AS reversed_amount
            FROM consumptions
            WHERE registered_by = $1 AND cashbox_id = $2
              AND registered_at >= $3 AND registered_at < $4
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(Uuid::from(cashbox_id))
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(ClosureTotals {
            consumption_count: row.consumption_count as u32,
            reversed_count: row.reversed_count as u32,
            total_amount: Money::new(row.total_amount),
            reversed_amount: Money::new(row.reversed_amount),
        })
    }

    async fn insert_closure(&self, closure: &CashClosure) -> Result<(), PortError> {
        // the unique key on (user_id, cashbox_id, closure_date) turns a
        // concurrent double close into a Conflict
        sqlx::query(
            r#"
            INSERT INTO cash_closures (
                id, user_id, cashbox_id, provider_id, store_id, company_id,
                closure_date, closed_at,
                consumption_count, reversed_count, total_amount, reversed_amount,
                notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(Uuid::from(closure.id))
        .bind(Uuid::from(closure.user_id))
        .bind(Uuid::from(closure.cashbox_id))
        .bind(Uuid::from(closure.provider_id))
        .bind(Uuid::from(closure.store_id))
        .bind(closure.company_id.map(Uuid::from))
        .bind(closure.closure_date)
        .bind(closure.closed_at)
        .bind(i64::from(closure.totals.consumption_count))
        .bind(i64::from(closure.totals.reversed_count))
        .bind(closure.totals.total_amount.amount())
        .bind(closure.totals.reversed_amount.amount())
        .bind(closure.notes.as_deref())
        .execute(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(())
    }
}
