//! Core Kernel - Foundational types and utilities for the benefits platform
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - Money and rate types with precise decimal arithmetic
//! - Timezone-aware temporal types and an injectable clock
//! - Strongly-typed identifiers
//! - Port abstractions shared by all store adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;
pub mod error;

pub use money::{Money, Rate, MoneyError};
pub use temporal::{Clock, SystemClock, FixedClock, Timezone, TemporalError, one_month_before};
pub use identifiers::{
    ClientId, CompanyId, ProviderId, StoreId, CashboxId, UserId,
    ConsumptionId, ReceivableDocumentId, PayableDocumentId,
    ReceivablePaymentId, PayablePaymentId, RefinancingId,
    RefinancingPaymentId, CashClosureId, AssignmentId, DetailId,
};
pub use ports::{PortError, DomainPort};
pub use error::CoreError;
