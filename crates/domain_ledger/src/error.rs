//! Ledger domain errors

use chrono::NaiveDate;
use core_kernel::{
    CashboxId, ClientId, CompanyId, ConsumptionId, Money, PortError, UserId,
};
use thiserror::Error;

/// Errors that can occur in the ledger domain
///
/// Conflict variants carry the balances and limits involved so callers can
/// present actionable context (e.g. how much credit remains).
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount must be strictly positive
    #[error("Invalid amount: {0} (must be greater than zero)")]
    InvalidAmount(Money),

    /// The cashbox/store/provider chain does not match the request
    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// The registering user has no active assignment covering the sale point
    #[error("User {user_id} is not authorized on cashbox {cashbox_id}")]
    Unauthorized {
        user_id: UserId,
        cashbox_id: CashboxId,
    },

    /// The cashier already declared their closure for today
    #[error("Cashbox {cashbox_id} is closed for user {user_id} on {date}")]
    CashboxClosed {
        user_id: UserId,
        cashbox_id: CashboxId,
        date: NaiveDate,
    },

    /// Cashbox not found
    #[error("Cashbox not found: {0}")]
    CashboxNotFound(CashboxId),

    /// Client not found
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    /// Client is deactivated
    #[error("Client is inactive: {0}")]
    ClientInactive(ClientId),

    /// The client's company is deactivated
    #[error("Company is inactive: {0}")]
    CompanyInactive(CompanyId),

    /// The client's available balance does not cover the amount
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Money,
        requested: Money,
    },

    /// Registering would push the company past its credit limit
    #[error(
        "Company limit exceeded: limit {limit}, consumed {consumed}, requested {requested}"
    )]
    CompanyLimitExceeded {
        limit: Money,
        consumed: Money,
        requested: Money,
    },

    /// Consumption not found
    #[error("Consumption not found: {0}")]
    ConsumptionNotFound(ConsumptionId),

    /// The consumption was already reversed
    #[error("Consumption already reversed: {0}")]
    AlreadyReversed(ConsumptionId),

    /// A closure already exists for this user, cashbox and date
    #[error("Cashbox {cashbox_id} already closed by user {user_id} on {date}")]
    AlreadyClosed {
        user_id: UserId,
        cashbox_id: CashboxId,
        date: NaiveDate,
    },

    /// Store adapter failure
    #[error(transparent)]
    Store(#[from] PortError),
}
