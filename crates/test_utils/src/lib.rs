//! Test Utilities - In-memory adapters and fixtures
//!
//! `InMemoryStore` implements every domain store port with the same
//! re-validation and conflict semantics as the PostgreSQL adapters, so the
//! full registration → billing → payment → refinancing pipeline can run in
//! scenario tests without a database.

pub mod memory;
pub mod fixtures;

pub use memory::InMemoryStore;
pub use fixtures::{
    client, company, provider, seed_company_with_client, seed_network, SaleNetwork,
};
