//! Billing domain errors

use chrono::{DateTime, Utc};
use thiserror::Error;

use core_kernel::{CompanyId, Money, PortError, ProviderId};

/// Errors raised by billing operations
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invalid billing period: {from} .. {to}")]
    InvalidPeriod {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("An active document already covers this period")]
    DuplicatePeriod,

    #[error("No billable consumptions in the period")]
    NothingToBill,

    #[error("Company not found: {0}")]
    CompanyNotFound(CompanyId),

    #[error("Provider not found: {0}")]
    ProviderNotFound(ProviderId),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Document is already fully paid")]
    AlreadyPaid,

    #[error("Document is voided")]
    DocumentVoided,

    #[error("Document was refinanced; collect against the refinancing")]
    AlreadyRefinanced,

    #[error("Invalid payment amount {amount}: document pending is {pending}")]
    InvalidAmount { amount: Money, pending: Money },

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Payment is already voided")]
    PaymentAlreadyVoided,

    #[error(transparent)]
    Store(#[from] PortError),
}
