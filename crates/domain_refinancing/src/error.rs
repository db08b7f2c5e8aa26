//! Refinancing domain errors

use thiserror::Error;

use core_kernel::{Money, PortError, ReceivableDocumentId, RefinancingId};

use crate::debt::RefinancingStatus;

/// Errors raised by refinancing operations
#[derive(Debug, Error)]
pub enum RefinancingError {
    #[error("Receivable document not found: {0}")]
    DocumentNotFound(ReceivableDocumentId),

    #[error("Refinancing not found: {0}")]
    RefinancingNotFound(RefinancingId),

    #[error("Source document is already fully paid")]
    SourceAlreadyPaid,

    #[error("Source document is voided")]
    SourceVoided,

    #[error("Document already has an active refinancing")]
    AlreadyRefinanced,

    #[error("Document has no pending balance to refinance")]
    NoPendingBalance,

    #[error("Refinancing is already fully paid")]
    AlreadyPaid,

    #[error("Invalid payment amount {amount}: refinancing pending is {pending}")]
    InvalidAmount { amount: Money, pending: Money },

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: RefinancingStatus,
        to: RefinancingStatus,
    },

    #[error(transparent)]
    Store(#[from] PortError),
}
