//! PostgreSQL billing store
//!
//! Implements `BillingStore`. Document issuance serializes on a per-target
//! advisory lock (company or provider) plus the per-series counter lock from
//! `allocate_number`; the duplicate-period check re-runs under those locks
//! so concurrent cycles surface as `Conflict`. Payment commits lock the
//! document row and verify the plan's snapshot still matches before writing.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use core_kernel::{
    ClientId, CompanyId, DomainPort, Money, PayableDocumentId, PayablePaymentId, PortError,
    ProviderId, Rate, ReceivableDocumentId, ReceivablePaymentId,
};
use domain_billing::ports::{BillableConsumption, BillableSettlement, BillingStore};
use domain_billing::{
    DocumentSeries, IssuedPayable, IssuedReceivable, PayableDocument, PayableDraft,
    PayablePayment, PayablePaymentPlan, PayablePaymentReceipt, PayableStatus, PayableVoidPlan,
    PaymentMethod, ReceivableDocument, ReceivableDraft, ReceivablePayment,
    ReceivablePaymentPlan, ReceivablePaymentReceipt, ReceivableStatus, ReceivableVoidPlan,
    RestorationEntry,
};
use domain_ledger::{Company, Provider};

use crate::error::sqlx_to_port;
use crate::locks::advisory_lock;
use crate::repositories::allocate_number;
use crate::repositories::ledger::{CompanyRow, COMPANY_COLUMNS};

fn billing_lock(company_id: CompanyId) -> String {
    format!("company-billing-{}", Uuid::from(company_id))
}

fn settlement_lock(provider_id: ProviderId) -> String {
    format!("provider-settlement-{}", Uuid::from(provider_id))
}

pub(crate) fn receivable_status_str(status: ReceivableStatus) -> &'static str {
    match status {
        ReceivableStatus::Pending => "pending",
        ReceivableStatus::PartiallyPaid => "partially_paid",
        ReceivableStatus::Paid => "paid",
        ReceivableStatus::Overdue => "overdue",
        ReceivableStatus::Refinanced => "refinanced",
        ReceivableStatus::Voided => "voided",
    }
}

pub(crate) fn parse_receivable_status(raw: &str) -> Result<ReceivableStatus, PortError> {
    match raw {
        "pending" => Ok(ReceivableStatus::Pending),
        "partially_paid" => Ok(ReceivableStatus::PartiallyPaid),
        "paid" => Ok(ReceivableStatus::Paid),
        "overdue" => Ok(ReceivableStatus::Overdue),
        "refinanced" => Ok(ReceivableStatus::Refinanced),
        "voided" => Ok(ReceivableStatus::Voided),
        other => Err(PortError::internal(format!(
            "unknown receivable status '{other}'"
        ))),
    }
}

fn payable_status_str(status: PayableStatus) -> &'static str {
    match status {
        PayableStatus::Pending => "pending",
        PayableStatus::PartiallyPaid => "partially_paid",
        PayableStatus::Paid => "paid",
        PayableStatus::Overdue => "overdue",
        PayableStatus::Voided => "voided",
    }
}

fn parse_payable_status(raw: &str) -> Result<PayableStatus, PortError> {
    match raw {
        "pending" => Ok(PayableStatus::Pending),
        "partially_paid" => Ok(PayableStatus::PartiallyPaid),
        "paid" => Ok(PayableStatus::Paid),
        "overdue" => Ok(PayableStatus::Overdue),
        "voided" => Ok(PayableStatus::Voided),
        other => Err(PortError::internal(format!(
            "unknown payable status '{other}'"
        ))),
    }
}

fn method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "cash",
        PaymentMethod::Transfer => "transfer",
        PaymentMethod::Check => "check",
        PaymentMethod::Card => "card",
        PaymentMethod::Other => "other",
    }
}

fn parse_method(raw: &str) -> Result<PaymentMethod, PortError> {
    match raw {
        "cash" => Ok(PaymentMethod::Cash),
        "transfer" => Ok(PaymentMethod::Transfer),
        "check" => Ok(PaymentMethod::Check),
        "card" => Ok(PaymentMethod::Card),
        "other" => Ok(PaymentMethod::Other),
        other => Err(PortError::internal(format!(
            "unknown payment method '{other}'"
        ))),
    }
}

/// PostgreSQL-backed implementation of `BillingStore`
#[derive(Debug, Clone)]
pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresBillingStore {}

#[derive(FromRow)]
pub(crate) struct ReceivableDocumentRow {
    id: Uuid,
    company_id: Uuid,
    document_number: String,
    period_from: DateTime<Utc>,
    period_to: DateTime<Utc>,
    issued_at: DateTime<Utc>,
    due_date: DateTime<Utc>,
    total_amount: Decimal,
    paid_amount: Decimal,
    pending_amount: Decimal,
    status: String,
    refinanced: bool,
    voided_at: Option<DateTime<Utc>>,
    void_reason: Option<String>,
    notes: Option<String>,
}

pub(crate) const RECEIVABLE_COLUMNS: &str =
    "id, company_id, document_number, period_from, period_to, issued_at, due_date, \
     total_amount, paid_amount, pending_amount, status, refinanced, voided_at, \
     void_reason, notes";

impl ReceivableDocumentRow {
    pub(crate) fn into_domain(self) -> Result<ReceivableDocument, PortError> {
        Ok(ReceivableDocument {
            id: self.id.into(),
            company_id: self.company_id.into(),
            document_number: self.document_number.into(),
            period_from: self.period_from,
            period_to: self.period_to,
            issued_at: self.issued_at,
            due_date: self.due_date,
            total_amount: Money::new(self.total_amount),
            paid_amount: Money::new(self.paid_amount),
            pending_amount: Money::new(self.pending_amount),
            status: parse_receivable_status(&self.status)?,
            refinanced: self.refinanced,
            voided_at: self.voided_at,
            void_reason: self.void_reason,
            notes: self.notes,
        })
    }
}

#[derive(FromRow)]
struct PayableDocumentRow {
    id: Uuid,
    provider_id: Uuid,
    document_number: String,
    period_from: DateTime<Utc>,
    period_to: DateTime<Utc>,
    issued_at: DateTime<Utc>,
    due_date: DateTime<Utc>,
    gross_total: Decimal,
    commission_total: Decimal,
    net_total: Decimal,
    paid_amount: Decimal,
    pending_amount: Decimal,
    status: String,
    voided_at: Option<DateTime<Utc>>,
    void_reason: Option<String>,
    notes: Option<String>,
}

const PAYABLE_COLUMNS: &str =
    "id, provider_id, document_number, period_from, period_to, issued_at, due_date, \
     gross_total, commission_total, net_total, paid_amount, pending_amount, status, \
     voided_at, void_reason, notes";

impl PayableDocumentRow {
    fn into_domain(self) -> Result<PayableDocument, PortError> {
        Ok(PayableDocument {
            id: self.id.into(),
            provider_id: self.provider_id.into(),
            document_number: self.document_number.into(),
            period_from: self.period_from,
            period_to: self.period_to,
            issued_at: self.issued_at,
            due_date: self.due_date,
            gross_total: Money::new(self.gross_total),
            commission_total: Money::new(self.commission_total),
            net_total: Money::new(self.net_total),
            paid_amount: Money::new(self.paid_amount),
            pending_amount: Money::new(self.pending_amount),
            status: parse_payable_status(&self.status)?,
            voided_at: self.voided_at,
            void_reason: self.void_reason,
            notes: self.notes,
        })
    }
}

#[derive(FromRow)]
struct ProviderRow {
    id: Uuid,
    name: String,
    commission_percent: Decimal,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<ProviderRow> for Provider {
    fn from(row: ProviderRow) -> Self {
        Provider {
            id: row.id.into(),
            name: row.name,
            commission_percent: Rate::from_percentage(row.commission_percent),
            active: row.active,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ReceivablePaymentRow {
    id: Uuid,
    document_id: Uuid,
    receipt_number: String,
    amount: Decimal,
    method: String,
    reference: Option<String>,
    registered_by: Uuid,
    paid_at: DateTime<Utc>,
    voided: bool,
    voided_at: Option<DateTime<Utc>>,
    void_reason: Option<String>,
}

impl ReceivablePaymentRow {
    fn into_domain(self) -> Result<ReceivablePayment, PortError> {
        Ok(ReceivablePayment {
            id: self.id.into(),
            document_id: self.document_id.into(),
            receipt_number: self.receipt_number.into(),
            amount: Money::new(self.amount),
            method: parse_method(&self.method)?,
            reference: self.reference,
            registered_by: self.registered_by.into(),
            paid_at: self.paid_at,
            voided: self.voided,
            voided_at: self.voided_at,
            void_reason: self.void_reason,
        })
    }
}

#[derive(FromRow)]
struct PayablePaymentRow {
    id: Uuid,
    document_id: Uuid,
    receipt_number: String,
    amount: Decimal,
    method: String,
    reference: Option<String>,
    registered_by: Uuid,
    paid_at: DateTime<Utc>,
    voided: bool,
    voided_at: Option<DateTime<Utc>>,
    void_reason: Option<String>,
}

impl PayablePaymentRow {
    fn into_domain(self) -> Result<PayablePayment, PortError> {
        Ok(PayablePayment {
            id: self.id.into(),
            document_id: self.document_id.into(),
            receipt_number: self.receipt_number.into(),
            amount: Money::new(self.amount),
            method: parse_method(&self.method)?,
            reference: self.reference,
            registered_by: self.registered_by.into(),
            paid_at: self.paid_at,
            voided: self.voided,
            voided_at: self.voided_at,
            void_reason: self.void_reason,
        })
    }
}

#[derive(FromRow)]
struct BillableRow {
    id: Uuid,
    client_id: Uuid,
    amount: Decimal,
}

#[derive(FromRow)]
struct SettlementRow {
    id: Uuid,
    amount: Decimal,
    commission_amount: Decimal,
    net_provider_amount: Decimal,
}

#[derive(FromRow)]
struct BilledByClientRow {
    client_id: Uuid,
    amount: Decimal,
}

/// Credits a client's balance, capped at their granted limit
///
/// Returns the amount actually credited. The client row is locked for the
/// rest of the transaction.
pub(crate) async fn restore_client_capped(
    tx: &mut Transaction<'_, Postgres>,
    client_id: ClientId,
    amount: Money,
    at: DateTime<Utc>,
) -> Result<Money, PortError> {
    #[derive(FromRow)]
    struct BalanceRow {
        balance: Decimal,
        original_limit: Decimal,
    }

    let row = sqlx::query_as::<_, BalanceRow>(
        "SELECT balance, original_limit FROM clients WHERE id = $1 FOR UPDATE",
    )
    .bind(Uuid::from(client_id))
    .fetch_optional(&mut **tx)
    .await
    .map_err(sqlx_to_port)?
    .ok_or_else(|| PortError::not_found("Client", client_id))?;

    let balance = Money::new(row.balance);
    let limit = Money::new(row.original_limit);
    let restored = (balance + amount).min(limit) - balance;

    if restored.is_positive() {
        sqlx::query(
            "UPDATE clients SET balance = balance + $2, updated_at = $3 WHERE id = $1",
        )
        .bind(Uuid::from(client_id))
        .bind(restored.amount())
        .bind(at)
        .execute(&mut **tx)
        .await
        .map_err(sqlx_to_port)?;
    }

    Ok(restored)
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
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

    async fn find_provider(
        &self,
        provider_id: ProviderId,
    ) -> Result<Option<Provider>, PortError> {
        let row = sqlx::query_as::<_, ProviderRow>(
            "SELECT id, name, commission_percent, active, created_at
             FROM providers WHERE id = $1",
        )
        .bind(Uuid::from(provider_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(row.map(Into::into))
    }

    async fn auto_cut_companies(&self) -> Result<Vec<Company>, PortError> {
        let rows = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE active AND auto_cut"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn active_receivable_exists(
        &self,
        company_id: CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<bool, PortError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                 SELECT 1 FROM receivable_documents
                 WHERE company_id = $1 AND period_from = $2 AND period_to = $3
                   AND status <> 'voided'
             )",
        )
        .bind(Uuid::from(company_id))
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_to_port)
    }

    async fn unbilled_consumptions(
        &self,
        company_id: CompanyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BillableConsumption>, PortError> {
        // a consumption on a voided document is billable again
        let rows = sqlx::query_as::<_, BillableRow>(
            r#"
            SELECT c.id, c.client_id, c.amount
            FROM consumptions c
            WHERE c.company_id = $1 AND NOT c.reversed
              AND c.registered_at >= $2 AND c.registered_at < $3
              AND NOT EXISTS (
                  SELECT 1 FROM receivable_details d
                  JOIN receivable_documents rd ON rd.id = d.document_id
                  WHERE d.consumption_id = c.id AND rd.status <> 'voided'
              )
            ORDER BY c.registered_at
            "#,
        )
        .bind(Uuid::from(company_id))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(rows
            .into_iter()
            .map(|r| BillableConsumption {
                consumption_id: r.id.into(),
                client_id: r.client_id.into(),
                amount: Money::new(r.amount),
            })
            .collect())
    }

    #[instrument(skip(self, draft), fields(company_id = %draft.company_id))]
    async fn create_receivable(
        &self,
        draft: &ReceivableDraft,
    ) -> Result<IssuedReceivable, PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        // serialize cycles per company, then re-check the duplicate guard
        advisory_lock(&mut tx, &billing_lock(draft.company_id)).await?;
        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM receivable_documents
                 WHERE company_id = $1 AND period_from = $2 AND period_to = $3
                   AND status <> 'voided'
             )",
        )
        .bind(Uuid::from(draft.company_id))
        .bind(draft.period_from)
        .bind(draft.period_to)
        .fetch_one(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;
        if duplicate {
            return Err(PortError::conflict("period already billed"));
        }

        let number =
            allocate_number(&mut tx, DocumentSeries::Receivable, draft.issued_at.year()).await?;
        let document_id = ReceivableDocumentId::new_v7();

        sqlx::query(
            r#"
            INSERT INTO receivable_documents (
                id, company_id, document_number, period_from, period_to,
                issued_at, due_date, total_amount, paid_amount, pending_amount,
                status, refinanced, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $8, 'pending', false, $9)
            "#,
        )
        .bind(Uuid::from(document_id))
        .bind(Uuid::from(draft.company_id))
        .bind(number.as_str())
        .bind(draft.period_from)
        .bind(draft.period_to)
        .bind(draft.issued_at)
        .bind(draft.due_date)
        .bind(draft.total_amount.amount())
        .bind(draft.notes.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        for detail in &draft.details {
            sqlx::query(
                "INSERT INTO receivable_details (id, document_id, consumption_id, client_id, amount)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(Uuid::from(document_id))
            .bind(Uuid::from(detail.consumption_id))
            .bind(Uuid::from(detail.client_id))
            .bind(detail.amount.amount())
            .execute(&mut *tx)
            .await
            .map_err(sqlx_to_port)?;
        }

        tx.commit().await.map_err(sqlx_to_port)?;
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
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                 SELECT 1 FROM payable_documents
                 WHERE provider_id = $1 AND period_from = $2 AND period_to = $3
                   AND status <> 'voided'
             )",
        )
        .bind(Uuid::from(provider_id))
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_to_port)
    }

    async fn unsettled_consumptions(
        &self,
        provider_id: ProviderId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BillableSettlement>, PortError> {
        let rows = sqlx::query_as::<_, SettlementRow>(
            r#"
            SELECT c.id, c.amount, c.commission_amount, c.net_provider_amount
            FROM consumptions c
            WHERE c.provider_id = $1 AND NOT c.reversed
              AND c.registered_at >= $2 AND c.registered_at < $3
              AND NOT EXISTS (
                  SELECT 1 FROM payable_details d
                  JOIN payable_documents pd ON pd.id = d.document_id
                  WHERE d.consumption_id = c.id AND pd.status <> 'voided'
              )
            ORDER BY c.registered_at
            "#,
        )
        .bind(Uuid::from(provider_id))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        Ok(rows
            .into_iter()
            .map(|r| BillableSettlement {
                consumption_id: r.id.into(),
                gross_amount: Money::new(r.amount),
                commission_amount: Money::new(r.commission_amount),
                net_amount: Money::new(r.net_provider_amount),
            })
            .collect())
    }

    #[instrument(skip(self, draft), fields(provider_id = %draft.provider_id))]
    async fn create_payable(&self, draft: &PayableDraft) -> Result<IssuedPayable, PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        advisory_lock(&mut tx, &settlement_lock(draft.provider_id)).await?;
        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM payable_documents
                 WHERE provider_id = $1 AND period_from = $2 AND period_to = $3
                   AND status <> 'voided'
             )",
        )
        .bind(Uuid::from(draft.provider_id))
        .bind(draft.period_from)
        .bind(draft.period_to)
        .fetch_one(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;
        if duplicate {
            return Err(PortError::conflict("period already settled"));
        }

        let number =
            allocate_number(&mut tx, DocumentSeries::Payable, draft.issued_at.year()).await?;
        let document_id = PayableDocumentId::new_v7();

        sqlx::query(
            r#"
            INSERT INTO payable_documents (
                id, provider_id, document_number, period_from, period_to,
                issued_at, due_date, gross_total, commission_total, net_total,
                paid_amount, pending_amount, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, $10, 'pending', $11)
            "#,
        )
        .bind(Uuid::from(document_id))
        .bind(Uuid::from(draft.provider_id))
        .bind(number.as_str())
        .bind(draft.period_from)
        .bind(draft.period_to)
        .bind(draft.issued_at)
        .bind(draft.due_date)
        .bind(draft.gross_total.amount())
        .bind(draft.commission_total.amount())
        .bind(draft.net_total.amount())
        .bind(draft.notes.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        for detail in &draft.details {
            sqlx::query(
                "INSERT INTO payable_details
                     (id, document_id, consumption_id, gross_amount, commission_amount, net_amount)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(Uuid::from(document_id))
            .bind(Uuid::from(detail.consumption_id))
            .bind(detail.gross_amount.amount())
            .bind(detail.commission_amount.amount())
            .bind(detail.net_amount.amount())
            .execute(&mut *tx)
            .await
            .map_err(sqlx_to_port)?;
        }

        tx.commit().await.map_err(sqlx_to_port)?;
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
        let row = sqlx::query_as::<_, ReceivableDocumentRow>(&format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivable_documents WHERE id = $1"
        ))
        .bind(Uuid::from(document_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        row.map(ReceivableDocumentRow::into_domain).transpose()
    }

    async fn find_payable(
        &self,
        document_id: PayableDocumentId,
    ) -> Result<Option<PayableDocument>, PortError> {
        let row = sqlx::query_as::<_, PayableDocumentRow>(&format!(
            "SELECT {PAYABLE_COLUMNS} FROM payable_documents WHERE id = $1"
        ))
        .bind(Uuid::from(document_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        row.map(PayableDocumentRow::into_domain).transpose()
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

    #[instrument(skip(self, plan), fields(document_id = %plan.document_id, amount = %plan.amount))]
    async fn commit_receivable_payment(
        &self,
        plan: &ReceivablePaymentPlan,
    ) -> Result<ReceivablePaymentReceipt, PortError> {
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

        // the plan was computed against a snapshot; bail out if the totals
        // moved underneath it
        if document.refinanced
            || matches!(document.status, ReceivableStatus::Voided)
            || document.pending_amount != plan.new_pending_amount + plan.amount
        {
            return Err(PortError::conflict("document changed concurrently"));
        }

        let receipt_number = allocate_number(
            &mut tx,
            DocumentSeries::ReceivableReceipt,
            plan.paid_at.year(),
        )
        .await?;
        let payment_id = ReceivablePaymentId::new_v7();

        sqlx::query(
            r#"
            INSERT INTO receivable_payments (
                id, document_id, receipt_number, amount, method, reference,
                registered_by, paid_at, voided
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false)
            "#,
        )
        .bind(Uuid::from(payment_id))
        .bind(Uuid::from(plan.document_id))
        .bind(receipt_number.as_str())
        .bind(plan.amount.amount())
        .bind(method_str(plan.method))
        .bind(plan.reference.as_deref())
        .bind(Uuid::from(plan.registered_by))
        .bind(plan.paid_at)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        sqlx::query(
            "UPDATE receivable_documents
             SET paid_amount = $2, pending_amount = $3, status = $4
             WHERE id = $1",
        )
        .bind(Uuid::from(plan.document_id))
        .bind(plan.new_paid_amount.amount())
        .bind(plan.new_pending_amount.amount())
        .bind(receivable_status_str(plan.new_status))
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        let mut restored = Vec::with_capacity(plan.restorations.len());
        for entry in &plan.restorations {
            let credited =
                restore_client_capped(&mut tx, entry.client_id, entry.amount, plan.paid_at)
                    .await?;
            restored.push(RestorationEntry {
                client_id: entry.client_id,
                amount: credited,
            });
        }

        tx.commit().await.map_err(sqlx_to_port)?;
        Ok(ReceivablePaymentReceipt {
            payment_id,
            receipt_number,
            amount: plan.amount,
            document_status: plan.new_status,
            restored,
        })
    }

    #[instrument(skip(self, plan), fields(document_id = %plan.document_id, amount = %plan.amount))]
    async fn commit_payable_payment(
        &self,
        plan: &PayablePaymentPlan,
    ) -> Result<PayablePaymentReceipt, PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        let row = sqlx::query_as::<_, PayableDocumentRow>(&format!(
            "SELECT {PAYABLE_COLUMNS} FROM payable_documents WHERE id = $1 FOR UPDATE"
        ))
        .bind(Uuid::from(plan.document_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(sqlx_to_port)?
        .ok_or_else(|| PortError::not_found("PayableDocument", plan.document_id))?;
        let document = row.into_domain()?;

        if matches!(document.status, PayableStatus::Voided)
            || document.pending_amount != plan.new_pending_amount + plan.amount
        {
            return Err(PortError::conflict("document changed concurrently"));
        }

        let receipt_number = allocate_number(
            &mut tx,
            DocumentSeries::PayableReceipt,
            plan.paid_at.year(),
        )
        .await?;
        let payment_id = PayablePaymentId::new_v7();

        sqlx::query(
            r#"
            INSERT INTO payable_payments (
                id, document_id, receipt_number, amount, method, reference,
                registered_by, paid_at, voided
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false)
            "#,
        )
        .bind(Uuid::from(payment_id))
        .bind(Uuid::from(plan.document_id))
        .bind(receipt_number.as_str())
        .bind(plan.amount.amount())
        .bind(method_str(plan.method))
        .bind(plan.reference.as_deref())
        .bind(Uuid::from(plan.registered_by))
        .bind(plan.paid_at)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        sqlx::query(
            "UPDATE payable_documents
             SET paid_amount = $2, pending_amount = $3, status = $4
             WHERE id = $1",
        )
        .bind(Uuid::from(plan.document_id))
        .bind(plan.new_paid_amount.amount())
        .bind(plan.new_pending_amount.amount())
        .bind(payable_status_str(plan.new_status))
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        tx.commit().await.map_err(sqlx_to_port)?;
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
        let row = sqlx::query_as::<_, ReceivablePaymentRow>(
            "SELECT id, document_id, receipt_number, amount, method, reference,
                    registered_by, paid_at, voided, voided_at, void_reason
             FROM receivable_payments WHERE id = $1",
        )
        .bind(Uuid::from(payment_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        let Some(row) = row else { return Ok(None) };
        let payment = row.into_domain()?;
        let document = self
            .find_receivable(payment.document_id)
            .await?
            .ok_or_else(|| PortError::not_found("ReceivableDocument", payment.document_id))?;
        Ok(Some((payment, document)))
    }

    async fn find_payable_payment(
        &self,
        payment_id: PayablePaymentId,
    ) -> Result<Option<(PayablePayment, PayableDocument)>, PortError> {
        let row = sqlx::query_as::<_, PayablePaymentRow>(
            "SELECT id, document_id, receipt_number, amount, method, reference,
                    registered_by, paid_at, voided, voided_at, void_reason
             FROM payable_payments WHERE id = $1",
        )
        .bind(Uuid::from(payment_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_to_port)?;

        let Some(row) = row else { return Ok(None) };
        let payment = row.into_domain()?;
        let document = self
            .find_payable(payment.document_id)
            .await?
            .ok_or_else(|| PortError::not_found("PayableDocument", payment.document_id))?;
        Ok(Some((payment, document)))
    }

    #[instrument(skip(self, plan), fields(payment_id = %plan.payment_id))]
    async fn commit_void_receivable_payment(
        &self,
        plan: &ReceivableVoidPlan,
    ) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        let voided: bool = sqlx::query_scalar(
            "SELECT voided FROM receivable_payments WHERE id = $1 FOR UPDATE",
        )
        .bind(Uuid::from(plan.payment_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(sqlx_to_port)?
        .ok_or_else(|| PortError::not_found("ReceivablePayment", plan.payment_id))?;
        if voided {
            return Err(PortError::conflict("payment already voided"));
        }

        sqlx::query(
            "UPDATE receivable_payments
             SET voided = true, voided_at = $2, void_reason = $3
             WHERE id = $1",
        )
        .bind(Uuid::from(plan.payment_id))
        .bind(plan.voided_at)
        .bind(plan.reason.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        sqlx::query(
            "UPDATE receivable_documents
             SET paid_amount = $2, pending_amount = $3, status = $4
             WHERE id = $1",
        )
        .bind(Uuid::from(plan.document_id))
        .bind(plan.new_paid_amount.amount())
        .bind(plan.new_pending_amount.amount())
        .bind(receivable_status_str(plan.new_status))
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        tx.commit().await.map_err(sqlx_to_port)
    }

    #[instrument(skip(self, plan), fields(payment_id = %plan.payment_id))]
    async fn commit_void_payable_payment(
        &self,
        plan: &PayableVoidPlan,
    ) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        let voided: bool = sqlx::query_scalar(
            "SELECT voided FROM payable_payments WHERE id = $1 FOR UPDATE",
        )
        .bind(Uuid::from(plan.payment_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(sqlx_to_port)?
        .ok_or_else(|| PortError::not_found("PayablePayment", plan.payment_id))?;
        if voided {
            return Err(PortError::conflict("payment already voided"));
        }

        sqlx::query(
            "UPDATE payable_payments
             SET voided = true, voided_at = $2, void_reason = $3
             WHERE id = $1",
        )
        .bind(Uuid::from(plan.payment_id))
        .bind(plan.voided_at)
        .bind(plan.reason.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        sqlx::query(
            "UPDATE payable_documents
             SET paid_amount = $2, pending_amount = $3, status = $4
             WHERE id = $1",
        )
        .bind(Uuid::from(plan.document_id))
        .bind(plan.new_paid_amount.amount())
        .bind(plan.new_pending_amount.amount())
        .bind(payable_status_str(plan.new_status))
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        tx.commit().await.map_err(sqlx_to_port)
    }

    #[instrument(skip(self, reason), fields(document_id = %document_id))]
    async fn commit_receivable_void(
        &self,
        document_id: ReceivableDocumentId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(sqlx_to_port)?;

        let row = sqlx::query_as::<_, ReceivableDocumentRow>(&format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivable_documents WHERE id = $1 FOR UPDATE"
        ))
        .bind(Uuid::from(document_id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(sqlx_to_port)?
        .ok_or_else(|| PortError::not_found("ReceivableDocument", document_id))?;
        let document = row.into_domain()?;

        if document.refinanced
            || matches!(document.status, ReceivableStatus::Voided)
            || document.paid_amount.is_positive()
        {
            return Err(PortError::conflict("document is not voidable"));
        }

        sqlx::query(
            "UPDATE receivable_documents
             SET status = 'voided', voided_at = $2, void_reason = $3
             WHERE id = $1",
        )
        .bind(Uuid::from(document_id))
        .bind(at)
        .bind(reason.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_to_port)?;

        tx.commit().await.map_err(sqlx_to_port)
    }
}
