//! Billing Domain - Documents, cycles and payment application
//!
//! This crate turns the consumption ledger into money movements:
//!
//! - **Billing cycles** freeze a period's unbilled consumptions into a
//!   receivable document (company side) or a payable document (provider
//!   side, net of the frozen commission split).
//! - **Sequential numbering** stamps every issued document and receipt with
//!   a `PREFIX-YYYY-NNNNN` number allocated inside the issuing transaction.
//! - **Payments** settle documents; receivable payments additionally restore
//!   client balances in proportion to each client's share of the document,
//!   capped at their granted limit.
//! - **The cut scheduler** issues receivables unattended on each company's
//!   configured cut day.
//!
//! Everything here plans against snapshots and commits through the
//! `BillingStore` port, which owns atomicity and concurrency control.

pub mod numbering;
pub mod receivable;
pub mod payable;
pub mod payment;
pub mod cycle;
pub mod scheduler;
pub mod ports;
pub mod error;

pub use numbering::{DocumentNumber, DocumentSeries};
pub use receivable::{
    DraftDetail, IssuedReceivable, ReceivableDetail, ReceivableDocument, ReceivableDraft,
    ReceivableStatus,
};
pub use payable::{
    IssuedPayable, PayableDetail, PayableDocument, PayableDraft, PayableDraftDetail,
    PayableStatus, PAYABLE_TERM_DAYS,
};
pub use payment::{
    plan_payable_payment, plan_receivable_payment, plan_void_payable_payment,
    plan_void_receivable_payment, ApplyPayablePayment, ApplyReceivablePayment, PayablePayment,
    PayablePaymentPlan, PayablePaymentReceipt, PayableVoidPlan, PaymentMethod, PaymentService,
    ReceivablePayment, ReceivablePaymentPlan, ReceivablePaymentReceipt, ReceivableVoidPlan,
    RestorationEntry,
};
pub use cycle::{BillingCycleService, GeneratePayable, GenerateReceivable};
pub use scheduler::{CutRunSummary, CutScheduler, DEFAULT_TICK_INTERVAL};
pub use ports::{BillableConsumption, BillableSettlement, BillingStore};
pub use error::BillingError;
