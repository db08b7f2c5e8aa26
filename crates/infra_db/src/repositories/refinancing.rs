//! PostgreSQL refinancing store
//!
//! Implements `RefinancingStore`. Debt creation locks the source document
//! row, re-checks that it is still refinanceable, allocates the `REF` number
//! and credits each billed client capped at their limit, all in one
//! transaction. Payment commits lock the debt row and mirror the totals
//! onto the source document.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{
    ClientId, DomainPort, Money, PortError, ReceivableDocumentId, RefinancingId,
    RefinancingPaymentId,
};
use domain_billing::{DocumentSeries, ReceivableDocument, ReceivableStatus};
use domain_refinancing::ports::{IssuedRefinancing, RefinancingStore};
use domain_refinancing::{
    RefinancingDebt, RefinancingPaymentPlan, RefinancingPlan, RefinancingStatus, WriteOffPlan,
};

use crate::error::sqlx_to_port;
use crate::locks::advisory_lock;
use crate::repositories::allocate_number;
use crate::repositories::billing::{
    receivable_status_str, restore_client_capped, ReceivableDocumentRow, RECEIVABLE_COLUMNS,
};

fn refinancing_status_str(status: RefinancingStatus) -> &'static str {
    match status {
        RefinancingStatus::Pending => "pending",
        RefinancingStatus::PartiallyPaid => "partially_paid",
        RefinancingStatus::Paid => "paid",
        RefinancingStatus::Overdue => "overdue",
        RefinancingStatus::WrittenOff => "written_off",
        RefinancingStatus::Voided => "voided",
    }
}

fn parse_refinancing_status(raw: &str) -> Result<RefinancingStatus, PortError> {
    match raw {
        "pending" => Ok(RefinancingStatus::Pending),
        "partially_paid" => Ok(RefinancingStatus::PartiallyPaid),
        "paid" => Ok(RefinancingStatus::Paid),
        "overdue" => Ok(RefinancingStatus::Overdue),
        "written_off" => Ok(RefinancingStatus::WrittenOff),
        "voided" => Ok(RefinancingStatus::Voided),
        other => Err(PortError::internal(format!(
            "unknown refinancing status '{other}'"
        ))),
    }
}

fn method_str(method: domain_billing::PaymentMethod) -> &'static str {
    match method {
        domain_billing::PaymentMethod::Cash => "cash",
        domain_billing::PaymentMethod::Transfer => "transfer",
        domain_billing::PaymentMethod::Check => "check",
        domain_billing::PaymentMethod::Card => "card",
        domain_billing::PaymentMethod::Other => "other",
    }
}

/// PostgreSQL-backed implementation of `RefinancingStore`
#[derive(Debug, Clone)]
pub struct PostgresRefinancingStore {
    pool: PgPool,
}

impl PostgresRefinancingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresRefinancingStore {}

#[derive(FromRow)]
struct RefinancingRow {
    id: Uuid,
    document_id: Uuid,
    company_id: Uuid,
    refinancing_number: String,
    original_amount: Decimal,
    paid_amount: Decimal,
    pending_amount: Decimal,
    due_date: DateTime<Utc>,
    status: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
    written_off_at: Option<DateTime<Utc>>,
    write_off_reason: Option<String>,
}

const REFINANCING_COLUMNS: &str =
    "id, document_id, company_id, refinancing_number, original_amount, paid_amount, \
     pending_amount, due_date, status, reason, created_at, written_off_at, \
     write_off_reason";

impl RefinancingRow {
    fn into_domain(self) -> Result<RefinancingDebt, PortError> {
        Ok(RefinancingDebt {
            id: self.id.into(),
            document_id: self.document_id.into(),
            company_id: self.company_id.into(),
            refinancing_number: self.refinancing_number.into(),
            original_amount: Money::new(self.original_amount),
            paid_amount: Money::new(self.paid_amount),
            pending_amount: Money::new(self.pending_amount),
            due_date: self.due_date,
            status: parse_refinancing_status(&self.status)?,
            reason: self.reason,
            created_at: self.created_at,
            written_off_at: self.written_off_at,
            write_off_reason: self.write_off_reason,
        })
    }
}

#[derive(FromRow)]
struct BilledByClientRow {
    client_id: Uuid,
    amount: Decimal,
}

#[async_trait]
impl RefinancingStore for PostgresRefinancingStore {
    async fn find_receivable(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Option<ReceivableDocument>, PortError> {
        let row = sqlx::query_as::<_, ReceivableDocumentRow>(&format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivable_documents WHERE id = $1"
        ))
        .bind(Uuid::from(document_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        row.map(ReceivableDocumentRow::into_domain).transpose()
    }

    async fn billed_amounts_by_client(
        &self,
        document_id: ReceivableDocumentId,
    ) -> Result<Vec<(ClientId, Money)>, PortError> {
        let rows = sqlx::query_as::<_, BilledByClientRow>(
            "SELECT client_id, SUM(amount) AS amount
             FROM receivable_details WHERE document_id = $1
             GROUP BY client_id ORDER BY client_id",
        )
        .bind(Uuid::from(document_id))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(rows
            .into_iter()
            .map(|r| (ClientId::from(r.client_id), Money::new(r.amount)))
            .collect())
    }

    #[instrument(skip(self, plan), fields(document_id = %plan.document_id))]
    async fn create_refinancing(
        &self,
        plan: &RefinancingPlan,
    ) -> Result<IssuedRefinancing, PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        let row = sqlx::query_as::<_, ReceivableDocumentRow>(&format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivable_documents WHERE id = $1 FOR UPDATE"
        ))
        .bind(Uuid::from(plan.document_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(sqlx_to_port)?
        .ok_or_else(|| PortError::not_found("ReceivableDocument", plan.document_id))?;
        let document = row.into_domain()?;

        // the plan was built from a snapshot; another writer may have paid
        // or refinanced the document since
        if document.refinanced
            || matches!(document.status, ReceivableStatus::Voided)
            || document.pending_amount != plan.original_amount
        {
            return Err(PortError::conflict("document changed concurrently"));
        }

        let number =
            allocate_number(&mut tx, DocumentSeries::Refinancing, plan.created_at.year())
                .await?;
        let refinancing_id = RefinancingId::new_v7();

        sqlx::query(
            r#"
            INSERT INTO refinancing_debts (
                id, document_id, company_id, refinancing_number, original_amount,
                paid_amount, pending_amount, due_date, status, reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, 0, $5, $6, 'pending', $7, $8)
            "#,
        )
        .bind(Uuid::from(refinancing_id))
        .bind(Uuid::from(plan.document_id))
        .bind(Uuid::from(plan.company_id))
        .bind(number.as_str())
        .bind(plan.original_amount.amount())
        .bind(plan.due_date)
        .bind(plan.reason.as_deref())
        .bind(plan.created_at)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        sqlx::query(
            "UPDATE receivable_documents SET refinanced = true, status = 'refinanced'
             WHERE id = $1",
        )
        .bind(Uuid::from(plan.document_id))
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        let mut restored = Vec::with_capacity(plan.restorations.len());
        for (client_id, amount) in &plan.restorations {
            let credited =
                restore_client_capped(&mut tx, *client_id, *amount, plan.created_at).await?;
            restored.push((*client_id, credited));
        }

        tx.commit().await.map_err(sqlx_to_port)?;
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
        let row = sqlx::query_as::<_, RefinancingRow>(&format!(
            "SELECT {REFINANCING_COLUMNS} FROM refinancing_debts WHERE id = $1"
        ))
        .bind(Uuid::from(refinancing_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        row.map(RefinancingRow::into_domain).transpose()
    }

    #[instrument(skip(self, plan), fields(refinancing_id = %plan.refinancing_id, amount = %plan.amount))]
    async fn commit_refinancing_payment(
        &self,
        plan: &RefinancingPaymentPlan,
    ) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        let row = sqlx::query_as::<_, RefinancingRow>(&format!(
            "SELECT {REFINANCING_COLUMNS} FROM refinancing_debts WHERE id = $1 FOR UPDATE"
        ))
        .bind(Uuid::from(plan.refinancing_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(sqlx_to_port)?
        .ok_or_else(|| PortError::not_found("RefinancingDebt", plan.refinancing_id))?;
        let debt = row.into_domain()?;

        if matches!(
            debt.status,
            RefinancingStatus::Paid | RefinancingStatus::WrittenOff | RefinancingStatus::Voided
        ) || debt.pending_amount != plan.new_pending_amount + plan.amount
        {
            return Err(PortError::conflict("debt changed concurrently"));
        }

        sqlx::query(
            r#"
            INSERT INTO refinancing_payments (
                id, refinancing_id, amount, method, reference, registered_by, paid_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(RefinancingPaymentId::new_v7()))
        .bind(Uuid::from(plan.refinancing_id))
        .bind(plan.amount.amount())
        .bind(method_str(plan.method))
        .bind(plan.reference.as_deref())
        .bind(Uuid::from(plan.registered_by))
        .bind(plan.paid_at)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        sqlx::query(
            "UPDATE refinancing_debts
             SET paid_amount = $2, pending_amount = $3, status = $4
             WHERE id = $1",
        )
        .bind(Uuid::from(plan.refinancing_id))
        .bind(plan.new_paid_amount.amount())
        .bind(plan.new_pending_amount.amount())
        .bind(refinancing_status_str(plan.new_status))
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        // the source document tracks the debt's totals
        sqlx::query(
            "UPDATE receivable_documents
             SET paid_amount = paid_amount + $2,
                 pending_amount = pending_amount - $2,
                 status = $3
             WHERE id = $1",
        )
        .bind(Uuid::from(plan.document_id))
        .bind(plan.amount.amount())
        .bind(receivable_status_str(plan.source_status))
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        tx.commit().await.map_err(sqlx_to_port)
    }

    #[instrument(skip(self, plan), fields(refinancing_id = %plan.refinancing_id))]
    async fn commit_write_off(&self, plan: &WriteOffPlan) -> Result<(), PortError> {
        let result = sqlx::query(
            "UPDATE refinancing_debts
             SET status = 'written_off', written_off_at = $2, write_off_reason = $3
             WHERE id = $1 AND status IN ('pending', 'partially_paid', 'overdue')",
        )
        .bind(Uuid::from(plan.refinancing_id))
        .bind(plan.written_off_at)
        .bind(plan.reason.as_deref())
        .execute(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        if result.rows_affected() == 0 {
            return Err(PortError::conflict("debt is not in a writable-off state"));
        }
        Ok(())
    }
}
