//! Database Infrastructure - PostgreSQL adapters for the domain store ports
//!
//! Provides connection pooling, embedded migrations, advisory-lock helpers
//! and the PostgreSQL implementations of `LedgerStore`, `BillingStore` and
//! `RefinancingStore`. Domain services plan against snapshots; the adapters
//! here own atomicity, re-validating every plan under row locks and
//! surfacing lost races as `PortError::Conflict`.

pub mod error;
pub mod locks;
pub mod pool;
pub mod repositories;

pub use error::DatabaseError;
pub use locks::{advisory_lock, lock_key};
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::{PostgresBillingStore, PostgresLedgerStore, PostgresRefinancingStore};
