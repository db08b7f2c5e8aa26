//! Request/Response data transfer objects
//!
//! Wire payloads are camelCase; domain enums keep their snake_case
//! serializations (`partially_paid`, `written_off`, ...).

pub mod ledger;
pub mod billing;
pub mod refinancing;
