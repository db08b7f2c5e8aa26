//! Consumption records
//!
//! A consumption is an employee spend at a cashbox. It snapshots the
//! provider's commission percentage at creation time and carries the
//! resulting gross / commission / net-to-provider split, so later commission
//! changes never rewrite history. The record is immutable except for the
//! write-once reversal fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    CashboxId, ClientId, CompanyId, ConsumptionId, Money, ProviderId, Rate, StoreId, UserId,
};

use crate::error::LedgerError;

/// An employee spend against their revolving balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consumption {
    /// Unique identifier
    pub id: ConsumptionId,
    /// Spending client
    pub client_id: ClientId,
    /// The client's company at registration time
    pub company_id: CompanyId,
    /// Provider / store / cashbox where the spend happened
    pub provider_id: ProviderId,
    pub store_id: StoreId,
    pub cashbox_id: CashboxId,
    /// Gross amount charged to the client
    pub amount: Money,
    /// Commission percentage snapshot at creation
    pub commission_percent: Rate,
    /// Platform share: `round(amount * pct / 100, 2)`
    pub commission_amount: Money,
    /// Provider share: `amount - commission_amount`
    pub net_provider_amount: Money,
    /// Free-text concept from the point of sale
    pub concept: Option<String>,
    /// External reference (ticket number, folio)
    pub reference: Option<String>,
    /// Cashier who registered the spend
    pub registered_by: UserId,
    /// Registration instant
    pub registered_at: DateTime<Utc>,
    /// Write-once reversal fields
    pub reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversed_by: Option<UserId>,
    pub reversal_reason: Option<String>,
}

/// Everything needed to create a consumption record
#[derive(Debug, Clone)]
pub struct NewConsumption {
    pub client_id: ClientId,
    pub company_id: CompanyId,
    pub provider_id: ProviderId,
    pub store_id: StoreId,
    pub cashbox_id: CashboxId,
    pub amount: Money,
    pub commission_percent: Rate,
    pub concept: Option<String>,
    pub reference: Option<String>,
    pub registered_by: UserId,
}

impl Consumption {
    /// Creates a consumption, computing the commission split
    pub fn register(new: NewConsumption, at: DateTime<Utc>) -> Self {
        let commission_amount = new.commission_percent.apply(new.amount);
        let net_provider_amount = new.amount - commission_amount;

        Self {
            id: ConsumptionId::new_v7(),
            client_id: new.client_id,
            company_id: new.company_id,
            provider_id: new.provider_id,
            store_id: new.store_id,
            cashbox_id: new.cashbox_id,
            amount: new.amount,
            commission_percent: new.commission_percent,
            commission_amount,
            net_provider_amount,
            concept: new.concept,
            reference: new.reference,
            registered_by: new.registered_by,
            registered_at: at,
            reversed: false,
            reversed_at: None,
            reversed_by: None,
            reversal_reason: None,
        }
    }

    /// Marks the consumption as reversed (write-once)
    ///
    /// # Errors
    ///
    /// Returns `AlreadyReversed` on a second attempt.
    pub fn reverse(
        &mut self,
        by: UserId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if self.reversed {
            return Err(LedgerError::AlreadyReversed(self.id));
        }
        self.reversed = true;
        self.reversed_at = Some(at);
        self.reversed_by = Some(by);
        self.reversal_reason = reason;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_consumption(amount: &str, pct: &str) -> NewConsumption {
        NewConsumption {
            client_id: ClientId::new(),
            company_id: CompanyId::new(),
            provider_id: ProviderId::new(),
            store_id: StoreId::new(),
            cashbox_id: CashboxId::new(),
            amount: Money::new(amount.parse().unwrap()),
            commission_percent: Rate::from_percentage(pct.parse().unwrap()),
            concept: None,
            reference: None,
            registered_by: UserId::new(),
        }
    }

    #[test]
    fn test_commission_split() {
        let c = Consumption::register(new_consumption("200.00", "7.5"), Utc::now());

        assert_eq!(c.commission_amount, Money::new(dec!(15.00)));
        assert_eq!(c.net_provider_amount, Money::new(dec!(185.00)));
        assert_eq!(c.commission_amount + c.net_provider_amount, c.amount);
    }

    #[test]
    fn test_zero_commission() {
        let c = Consumption::register(new_consumption("99.99", "0"), Utc::now());

        assert!(c.commission_amount.is_zero());
        assert_eq!(c.net_provider_amount, c.amount);
    }

    #[test]
    fn test_reverse_is_write_once() {
        let mut c = Consumption::register(new_consumption("50", "5"), Utc::now());
        let user = UserId::new();

        c.reverse(user, Some("wrong ticket".to_string()), Utc::now())
            .unwrap();
        assert!(c.reversed);
        assert_eq!(c.reversed_by, Some(user));

        let again = c.reverse(UserId::new(), None, Utc::now());
        assert!(matches!(again, Err(LedgerError::AlreadyReversed(_))));
        // first reversal untouched
        assert_eq!(c.reversed_by, Some(user));
    }
}
