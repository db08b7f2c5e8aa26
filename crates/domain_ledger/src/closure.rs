//! Cash closures
//!
//! A cash closure is a per-(user, cashbox, business day) declaration that a
//! cashier's shift is done. Its mere existence blocks further registrations
//! by that user on that cashbox for the day. Two cashiers sharing a cashbox
//! close independently; there is no global end-of-day process.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    CashClosureId, CashboxId, CompanyId, Money, ProviderId, StoreId, UserId,
};

use crate::consumption::Consumption;

/// Aggregated shift totals frozen into a closure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureTotals {
    /// Count of non-reversed consumptions registered in the shift
    pub consumption_count: u32,
    /// Count of consumptions registered in the shift and later reversed
    pub reversed_count: u32,
    /// Sum of non-reversed amounts
    pub total_amount: Money,
    /// Sum of reversed amounts
    pub reversed_amount: Money,
}

impl ClosureTotals {
    /// Aggregates a day's consumptions for one user and cashbox
    pub fn aggregate<'a>(consumptions: impl IntoIterator<Item = &'a Consumption>) -> Self {
        let mut totals = ClosureTotals::default();
        for c in consumptions {
            if c.reversed {
                totals.reversed_count += 1;
                totals.reversed_amount = totals.reversed_amount + c.amount;
            } else {
                totals.consumption_count += 1;
                totals.total_amount = totals.total_amount + c.amount;
            }
        }
        totals
    }
}

/// The per-day, per-user, per-cashbox closure lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashClosure {
    /// Unique identifier
    pub id: CashClosureId,
    /// Cashier declaring the closure
    pub user_id: UserId,
    /// Cashbox being closed
    pub cashbox_id: CashboxId,
    /// Denormalized hierarchy for reporting
    pub provider_id: ProviderId,
    pub store_id: StoreId,
    /// Company context if the cashier closed on behalf of one
    pub company_id: Option<CompanyId>,
    /// Business day the closure covers; part of the unique key
    pub closure_date: NaiveDate,
    /// Instant the closure was declared
    pub closed_at: DateTime<Utc>,
    /// Frozen shift totals
    pub totals: ClosureTotals,
    /// Free-text notes
    pub notes: Option<String>,
}

impl CashClosure {
    /// Creates a closure for a user's shift
    #[allow(clippy::too_many_arguments)]
    pub fn declare(
        user_id: UserId,
        cashbox_id: CashboxId,
        provider_id: ProviderId,
        store_id: StoreId,
        company_id: Option<CompanyId>,
        closure_date: NaiveDate,
        closed_at: DateTime<Utc>,
        totals: ClosureTotals,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: CashClosureId::new_v7(),
            user_id,
            cashbox_id,
            provider_id,
            store_id,
            company_id,
            closure_date,
            closed_at,
            totals,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumption::NewConsumption;
    use core_kernel::{ClientId, Rate};
    use rust_decimal_macros::dec;

    fn consumption(amount: &str, reversed: bool) -> Consumption {
        let mut c = Consumption::register(
            NewConsumption {
                client_id: ClientId::new(),
                company_id: CompanyId::new(),
                provider_id: ProviderId::new(),
                store_id: StoreId::new(),
                cashbox_id: CashboxId::new(),
                amount: Money::new(amount.parse().unwrap()),
                commission_percent: Rate::from_percentage(dec!(5)),
                concept: None,
                reference: None,
                registered_by: UserId::new(),
            },
            Utc::now(),
        );
        if reversed {
            c.reverse(UserId::new(), None, Utc::now()).unwrap();
        }
        c
    }

    #[test]
    fn test_totals_split_by_reversal() {
        let consumptions = vec![
            consumption("100", false),
            consumption("250.50", false),
            consumption("75", true),
        ];

        let totals = ClosureTotals::aggregate(&consumptions);
        assert_eq!(totals.consumption_count, 2);
        assert_eq!(totals.reversed_count, 1);
        assert_eq!(totals.total_amount, Money::new(dec!(350.50)));
        assert_eq!(totals.reversed_amount, Money::new(dec!(75)));
    }

    #[test]
    fn test_empty_shift_totals() {
        let totals = ClosureTotals::aggregate(&[]);
        assert_eq!(totals, ClosureTotals::default());
    }
}
