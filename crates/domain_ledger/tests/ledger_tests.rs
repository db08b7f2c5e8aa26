//! Black-box scenarios over the ledger public API
//!
//! These exercise the spend / reverse lifecycle and the closure totals with
//! the pure aggregates, the way the store adapter applies them. Store-backed
//! flows through `ConsumptionRegister` live in `test_utils`.

use chrono::Utc;
use rust_decimal_macros::dec;

use core_kernel::{CashboxId, ClientId, CompanyId, Money, ProviderId, Rate, StoreId, UserId};
use domain_ledger::closure::ClosureTotals;
use domain_ledger::consumption::NewConsumption;
use domain_ledger::{Client, Company, Consumption, LedgerError};

fn spend(client: &Client, amount: &str, commission_pct: &str) -> Consumption {
    Consumption::register(
        NewConsumption {
            client_id: client.id,
            company_id: client.company_id,
            provider_id: ProviderId::new(),
            store_id: StoreId::new(),
            cashbox_id: CashboxId::new(),
            amount: Money::new(amount.parse().unwrap()),
            commission_percent: Rate::from_percentage(commission_pct.parse().unwrap()),
            concept: Some("groceries".to_string()),
            reference: None,
            registered_by: UserId::new(),
        },
        Utc::now(),
    )
}

#[test]
fn spend_then_reverse_returns_to_full_balance() {
    let mut client = Client::enroll(CompanyId::new(), "Ana Torres", Money::new(dec!(1000)));

    let mut consumption = spend(&client, "300", "5");
    client.debit(consumption.amount).unwrap();
    assert_eq!(client.balance, Money::new(dec!(700)));

    consumption
        .reverse(UserId::new(), Some("wrong ticket".to_string()), Utc::now())
        .unwrap();
    let restored = client.restore_capped(consumption.amount);

    assert_eq!(restored, Money::new(dec!(300)));
    assert_eq!(client.balance, client.original_limit);
}

#[test]
fn reversal_after_limit_cut_is_capped() {
    // spend 300 of 1000, then the company lowers the limit to 600
    let mut client = Client::enroll(CompanyId::new(), "Luis Vega", Money::new(dec!(1000)));
    let consumption = spend(&client, "300", "5");
    client.debit(consumption.amount).unwrap();

    client.adjust_limit(Money::new(dec!(600))).unwrap();
    assert_eq!(client.balance, Money::new(dec!(600))); // clamped from 700

    // reversing the 300 only fits the limit partially
    let restored = client.restore_capped(consumption.amount);
    assert!(restored.is_zero());
    assert_eq!(client.balance, Money::new(dec!(600)));
}

#[test]
fn company_exposure_accumulates_across_clients() {
    let company = Company::new("Acme", Money::new(dec!(5000)), 15, 10);

    // 4700 already consumed across the workforce, one more 300 fits exactly
    assert!(company
        .check_credit_limit(Money::new(dec!(4700)), Money::new(dec!(300)))
        .is_ok());

    // 4800 consumed: the same 300 would breach the cap
    let err = company
        .check_credit_limit(Money::new(dec!(4800)), Money::new(dec!(300)))
        .unwrap_err();
    match err {
        LedgerError::CompanyLimitExceeded {
            limit,
            consumed,
            requested,
        } => {
            assert_eq!(limit, Money::new(dec!(5000)));
            assert_eq!(consumed, Money::new(dec!(4800)));
            assert_eq!(requested, Money::new(dec!(300)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn shift_totals_exclude_reversed_spends_from_the_collected_total() {
    let client = Client::enroll(CompanyId::new(), "Mara Ruiz", Money::new(dec!(2000)));

    let kept_a = spend(&client, "120.50", "5");
    let kept_b = spend(&client, "80", "5");
    let mut reversed = spend(&client, "45", "5");
    reversed.reverse(UserId::new(), None, Utc::now()).unwrap();

    let totals = ClosureTotals::aggregate([&kept_a, &kept_b, &reversed]);

    assert_eq!(totals.consumption_count, 2);
    assert_eq!(totals.total_amount, Money::new(dec!(200.50)));
    assert_eq!(totals.reversed_count, 1);
    assert_eq!(totals.reversed_amount, Money::new(dec!(45)));
}

#[test]
fn commission_snapshot_survives_rate_changes() {
    let client = Client::enroll(CompanyId::new(), "Eva Luna", Money::new(dec!(500)));
    let consumption = spend(&client, "200", "7.5");

    // the split is frozen on the record, independent of the provider's
    // current rate
    assert_eq!(consumption.commission_amount, Money::new(dec!(15)));
    assert_eq!(consumption.net_provider_amount, Money::new(dec!(185)));
    assert_eq!(
        consumption.commission_amount + consumption.net_provider_amount,
        consumption.amount
    );
}
