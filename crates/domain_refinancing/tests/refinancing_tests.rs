//! Black-box scenarios over the refinancing public API
//!
//! Store-backed flows through `RefinancingService` live in `test_utils`;
//! these walk the debt entity through its collection lifecycle.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use core_kernel::{CompanyId, Money, ReceivableDocumentId, RefinancingId};
use domain_billing::{DocumentNumber, DocumentSeries};
use domain_refinancing::{RefinancingDebt, RefinancingError, RefinancingStatus};

fn debt(principal: &str, due_in_days: i64) -> RefinancingDebt {
    let now = Utc::now();
    let amount = Money::new(principal.parse().unwrap());
    RefinancingDebt {
        id: RefinancingId::new_v7(),
        document_id: ReceivableDocumentId::new_v7(),
        company_id: CompanyId::new(),
        refinancing_number: DocumentNumber::format(DocumentSeries::Refinancing, 2026, 1),
        original_amount: amount,
        paid_amount: Money::zero(),
        pending_amount: amount,
        due_date: now + Duration::days(due_in_days),
        status: RefinancingStatus::Pending,
        reason: Some("cash-flow shortfall".to_string()),
        created_at: now,
        written_off_at: None,
        write_off_reason: None,
    }
}

#[test]
fn debt_collects_in_installments_until_paid() {
    let now = Utc::now();
    let mut debt = debt("700", 60);

    debt.record_payment(Money::new(dec!(250)), now);
    assert_eq!(debt.status, RefinancingStatus::PartiallyPaid);
    assert_eq!(debt.pending_amount, Money::new(dec!(450)));

    debt.record_payment(Money::new(dec!(450)), now);
    assert_eq!(debt.status, RefinancingStatus::Paid);
    assert!(debt.pending_amount.is_zero());
    assert_eq!(debt.paid_amount, debt.original_amount);
}

#[test]
fn overdue_debt_still_accepts_collection_and_write_off() {
    let now = Utc::now();
    let mut overdue = debt("700", -10);
    overdue.refresh_status(now);
    assert_eq!(overdue.status, RefinancingStatus::Overdue);

    // partial collection on an overdue debt
    overdue.record_payment(Money::new(dec!(100)), now);
    assert_eq!(overdue.status, RefinancingStatus::PartiallyPaid);

    // the remainder is written off, freezing the loss for reporting
    overdue.write_off(Some("uncollectable".into()), now).unwrap();
    assert_eq!(overdue.status, RefinancingStatus::WrittenOff);
    assert_eq!(overdue.pending_amount, Money::new(dec!(600)));
}

#[test]
fn settled_debt_is_immutable() {
    let now = Utc::now();
    let mut settled = debt("300", 30);
    settled.record_payment(Money::new(dec!(300)), now);

    assert!(matches!(
        settled.write_off(None, now),
        Err(RefinancingError::InvalidTransition { .. })
    ));

    // a late refresh never demotes a paid debt
    settled.refresh_status(now + Duration::days(90));
    assert_eq!(settled.status, RefinancingStatus::Paid);
}
