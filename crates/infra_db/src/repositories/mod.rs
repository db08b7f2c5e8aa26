//! PostgreSQL implementations of the domain store ports

pub mod ledger;
pub mod billing;
pub mod refinancing;

pub use ledger::PostgresLedgerStore;
pub use billing::PostgresBillingStore;
pub use refinancing::PostgresRefinancingStore;

use sqlx::{Postgres, Transaction};

use core_kernel::PortError;
use domain_billing::{DocumentNumber, DocumentSeries};

use crate::error::sqlx_to_port;
use crate::locks::advisory_lock;

/// Allocates the next number in a `(series, year)` sequence
///
/// Holds the per-series advisory lock for the rest of the transaction so a
/// rolled-back allocation never leaves a gap; the counter row upsert is the
/// read-increment-write.
pub(crate) async fn allocate_number(
    tx: &mut Transaction<'_, Postgres>,
    series: DocumentSeries,
    year: i32,
) -> Result<DocumentNumber, PortError> {
    advisory_lock(tx, &series.counter_key(year)).await?;

    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (series, year, value)
        VALUES ($1, $2, 1)
        ON CONFLICT (series, year)
        DO UPDATE SET value = document_sequences.value + 1
        RETURNING value
        "#,
    )
    .bind(series.prefix())
    .bind(year)
    .fetch_one(&mut **tx)
    .await
    .map_err(sqlx_to_port)?;

    Ok(DocumentNumber::format(series, year, value as u32))
}
