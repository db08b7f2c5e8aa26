//! Refinancing Domain - Scheduled debts carved out of receivables
//!
//! When a company cannot settle a receivable document, its outstanding
//! balance can be converted into a `RefinancingDebt` with a new due date.
//! The source document flips to `Refinanced`, every billed employee gets
//! their full billed amount restored immediately, and collection continues
//! against the debt through its own payment lifecycle and state machine,
//! including write-off for uncollectable debt.

pub mod debt;
pub mod service;
pub mod ports;
pub mod error;

pub use debt::{RefinancingDebt, RefinancingPayment, RefinancingStatus};
pub use service::{
    ApplyRefinancingPayment, CreateRefinancing, RefinancingPaymentPlan, RefinancingPlan,
    RefinancingService, WriteOffPlan,
};
pub use ports::{IssuedRefinancing, RefinancingStore};
pub use error::RefinancingError;
