//! Client aggregate
//!
//! A client is an employee enrolled in their company's benefit program. The
//! `balance` field is the credit still available to spend; `original_limit`
//! is the credit granted by the company. The aggregate enforces the
//! invariant `0 <= balance <= original_limit` on every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, CompanyId, Money};

use crate::error::LedgerError;

/// An enrolled employee with a revolving credit balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier
    pub id: ClientId,
    /// Employing company
    pub company_id: CompanyId,
    /// Display name
    pub full_name: String,
    /// Credit still available to spend
    pub balance: Money,
    /// Credit granted by the company
    pub original_limit: Money,
    /// Soft-deactivation flag; clients are never physically deleted
    pub active: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Enrolls a new client with a full balance equal to the granted limit
    pub fn enroll(company_id: CompanyId, full_name: impl Into<String>, limit: Money) -> Self {
        let now = Utc::now();
        Self {
            id: ClientId::new_v7(),
            company_id,
            full_name: full_name.into(),
            balance: limit,
            original_limit: limit,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Deducts a consumption amount from the available balance
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if the amount exceeds the available
    /// balance.
    pub fn debit(&mut self, amount: Money) -> Result<(), LedgerError> {
        if amount > self.balance {
            return Err(LedgerError::InsufficientBalance {
                available: self.balance,
                requested: amount,
            });
        }
        self.balance = self.balance - amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Restores balance, capped at the granted limit
    ///
    /// Reversals and payment restorations never push the balance above
    /// `original_limit`, which protects against limit changes between the
    /// original spend and the restoration.
    ///
    /// # Returns
    ///
    /// The amount actually credited back.
    pub fn restore_capped(&mut self, amount: Money) -> Money {
        let target = (self.balance + amount).min(self.original_limit);
        let restored = target - self.balance;
        self.balance = target;
        self.updated_at = Utc::now();
        restored
    }

    /// Changes the granted limit, clamping the balance into the new range
    ///
    /// Raising the limit leaves the balance untouched (the extra headroom
    /// only becomes spendable through payment or refinancing restoration);
    /// lowering it below the current balance clamps the balance down.
    pub fn adjust_limit(&mut self, new_limit: Money) -> Result<(), LedgerError> {
        if new_limit.is_negative() {
            return Err(LedgerError::InvalidAmount(new_limit));
        }
        self.original_limit = new_limit;
        self.balance = self.balance.min(new_limit);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Soft-deactivates the client
    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn client_with(balance: &str, limit: &str) -> Client {
        let mut client = Client::enroll(
            CompanyId::new(),
            "Ana Torres",
            Money::new(limit.parse().unwrap()),
        );
        client.balance = Money::new(balance.parse().unwrap());
        client
    }

    #[test]
    fn test_debit_within_balance() {
        let mut client = client_with("1000", "1000");
        client.debit(Money::new(dec!(300))).unwrap();
        assert_eq!(client.balance, Money::new(dec!(700)));
    }

    #[test]
    fn test_debit_over_balance_fails() {
        let mut client = client_with("100", "1000");
        let result = client.debit(Money::new(dec!(100.01)));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(client.balance, Money::new(dec!(100)));
    }

    #[test]
    fn test_restore_is_capped_at_limit() {
        let mut client = client_with("700", "1000");
        // A 400 restore would exceed the limit; only 300 lands
        let restored = client.restore_capped(Money::new(dec!(400)));
        assert_eq!(restored, Money::new(dec!(300)));
        assert_eq!(client.balance, client.original_limit);
    }

    #[test]
    fn test_lowering_limit_clamps_balance() {
        let mut client = client_with("800", "1000");
        client.adjust_limit(Money::new(dec!(500))).unwrap();
        assert_eq!(client.balance, Money::new(dec!(500)));
        assert_eq!(client.original_limit, Money::new(dec!(500)));
    }

    #[test]
    fn test_raising_limit_keeps_balance() {
        let mut client = client_with("200", "1000");
        client.adjust_limit(Money::new(dec!(2000))).unwrap();
        assert_eq!(client.balance, Money::new(dec!(200)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The balance invariant holds under any sequence of debits and
        /// capped restorations.
        #[test]
        fn balance_stays_within_bounds(
            limit_cents in 1i64..10_000_000i64,
            ops in proptest::collection::vec((any::<bool>(), 1i64..1_000_000i64), 0..50)
        ) {
            let limit = Money::from_cents(limit_cents);
            let mut client = Client::enroll(CompanyId::new(), "prop", limit);

            for (is_debit, cents) in ops {
                let amount = Money::from_cents(cents);
                if is_debit {
                    let _ = client.debit(amount);
                } else {
                    client.restore_capped(amount);
                }
                prop_assert!(!client.balance.is_negative());
                prop_assert!(client.balance <= client.original_limit);
            }
        }
    }
}
