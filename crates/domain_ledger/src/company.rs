//! Company aggregate
//!
//! Companies grant credit to their employees and are billed periodically.
//! `credit_limit` bounds the company's aggregate exposure across all of its
//! clients' non-reversed consumptions; zero means unlimited.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CompanyId, Money};

use crate::error::LedgerError;

/// A company participating in the benefit program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    /// Unique identifier
    pub id: CompanyId,
    /// Legal name
    pub name: String,
    /// Aggregate exposure cap across all clients; zero means unlimited
    pub credit_limit: Money,
    /// Day of month (1-28) on which the automatic billing cut runs
    pub cut_day: u8,
    /// Days after issuance before a receivable document is due
    pub grace_period_days: u16,
    /// Whether the scheduled cut generates documents unattended
    pub auto_cut: bool,
    /// Soft-deactivation flag
    pub active: bool,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Company {
    /// Creates a new company
    pub fn new(
        name: impl Into<String>,
        credit_limit: Money,
        cut_day: u8,
        grace_period_days: u16,
    ) -> Self {
        Self {
            id: CompanyId::new_v7(),
            name: name.into(),
            credit_limit,
            // cut days past 28 would skip short months
            cut_day: cut_day.clamp(1, 28),
            grace_period_days,
            auto_cut: false,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Returns true if the company has no aggregate cap
    pub fn is_unlimited(&self) -> bool {
        self.credit_limit.is_zero()
    }

    /// Checks whether a new consumption fits under the aggregate limit
    ///
    /// # Arguments
    ///
    /// * `consumed` - Sum of the company's non-reversed consumption amounts
    /// * `amount` - The new consumption being registered
    ///
    /// # Errors
    ///
    /// Returns `CompanyLimitExceeded` when `credit_limit > 0` and
    /// `consumed + amount` would pass it.
    pub fn check_credit_limit(&self, consumed: Money, amount: Money) -> Result<(), LedgerError> {
        if self.is_unlimited() {
            return Ok(());
        }
        if consumed + amount > self.credit_limit {
            return Err(LedgerError::CompanyLimitExceeded {
                limit: self.credit_limit,
                consumed,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Returns true if the scheduled cut should run for this company today
    pub fn is_cut_due(&self, today: NaiveDate) -> bool {
        self.active && self.auto_cut && u32::from(self.cut_day) == today.day()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limit_check_allows_within_limit() {
        let company = Company::new("Acme", Money::new(dec!(5000)), 15, 10);
        assert!(company
            .check_credit_limit(Money::new(dec!(4700)), Money::new(dec!(300)))
            .is_ok());
    }

    #[test]
    fn test_limit_check_rejects_over_limit() {
        let company = Company::new("Acme", Money::new(dec!(5000)), 15, 10);
        let result = company.check_credit_limit(Money::new(dec!(4800)), Money::new(dec!(300)));
        assert!(matches!(
            result,
            Err(LedgerError::CompanyLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_zero_limit_means_unlimited() {
        let company = Company::new("Acme", Money::zero(), 15, 10);
        assert!(company
            .check_credit_limit(Money::new(dec!(9_000_000)), Money::new(dec!(1_000_000)))
            .is_ok());
    }

    #[test]
    fn test_cut_day_is_clamped() {
        let company = Company::new("Acme", Money::zero(), 31, 10);
        assert_eq!(company.cut_day, 28);
    }

    #[test]
    fn test_cut_due_matches_day_and_flags() {
        let mut company = Company::new("Acme", Money::zero(), 15, 10);
        let the_15th = NaiveDate::from_ymd_opt(2026, 4, 15).unwrap();

        assert!(!company.is_cut_due(the_15th)); // auto_cut off
        company.auto_cut = true;
        assert!(company.is_cut_due(the_15th));
        assert!(!company.is_cut_due(NaiveDate::from_ymd_opt(2026, 4, 16).unwrap()));

        company.active = false;
        assert!(!company.is_cut_due(the_15th));
    }
}
