//! Ledger Domain - Revolving balances and consumption registration
//!
//! This crate owns the employee (`Client`) revolving balance and everything
//! that mutates it at point of sale:
//!
//! - **Consumption registration** validates a spend against the provider →
//!   store → cashbox hierarchy, the registering user's assignment, the cash
//!   closure gate, the client balance and the company credit limit, then
//!   records the consumption and the balance delta atomically.
//! - **Reversal** undoes a consumption once, restoring the balance capped at
//!   the client's granted limit.
//! - **Cash closure gate** is a per-(user, cashbox, day) lock: once a cashier
//!   declares their closure for the day, no further registrations are
//!   accepted on that cashbox for that user.
//!
//! Billing is deliberately absent here: consumptions become receivable and
//! payable documents later, in `domain_billing`.
//!
//! # Invariants
//!
//! - `0 <= client.balance <= client.original_limit` after every operation
//! - A consumption is immutable once created except for its write-once
//!   reversal fields
//! - Balance restoration never exceeds the granted limit, even if the limit
//!   changed between spend and reversal

pub mod client;
pub mod company;
pub mod network;
pub mod consumption;
pub mod closure;
pub mod register;
pub mod ports;
pub mod error;

pub use client::Client;
pub use company::Company;
pub use network::{Provider, Store, Cashbox, UserAssignment, AssignmentScope, SaleContext};
pub use consumption::Consumption;
pub use closure::{CashClosure, ClosureTotals};
pub use register::{
    ConsumptionRegister, CashClosureGate,
    RegisterConsumption, RegistrationReceipt,
    ReverseConsumption, ReversalReceipt,
    CloseCashbox, ClosureReceipt,
};
pub use ports::{LedgerStore, ReversalOutcome};
pub use error::LedgerError;
