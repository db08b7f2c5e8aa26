//! Black-box scenarios over the billing public API
//!
//! These walk a document through issue, partial payment, void and
//! re-payment using the pure planners, the way the store adapter applies
//! them. Store-backed scenarios live in `test_utils`.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use core_kernel::{ClientId, CompanyId, Money, ReceivableDocumentId, ReceivablePaymentId, UserId};
use domain_billing::{
    plan_receivable_payment, plan_void_receivable_payment, ApplyReceivablePayment,
    DocumentNumber, DocumentSeries, PaymentMethod, ReceivableDocument, ReceivablePayment,
    ReceivableStatus,
};

fn issued_document(total: Money, sequence: u32) -> ReceivableDocument {
    let now = Utc::now();
    ReceivableDocument {
        id: ReceivableDocumentId::new_v7(),
        company_id: CompanyId::new(),
        document_number: DocumentNumber::format(DocumentSeries::Receivable, 2026, sequence),
        period_from: now - Duration::days(30),
        period_to: now,
        issued_at: now,
        due_date: now + Duration::days(10),
        total_amount: total,
        paid_amount: Money::zero(),
        pending_amount: total,
        status: ReceivableStatus::Pending,
        refinanced: false,
        voided_at: None,
        void_reason: None,
        notes: None,
    }
}

fn pay(doc: &ReceivableDocument, amount: &str) -> ApplyReceivablePayment {
    ApplyReceivablePayment {
        document_id: doc.id,
        amount: Money::new(amount.parse().unwrap()),
        method: PaymentMethod::Transfer,
        reference: Some("wire-0017".to_string()),
        registered_by: UserId::new(),
    }
}

#[test]
fn document_settles_across_two_payments() {
    let now = Utc::now();
    let mut doc = issued_document(Money::new(dec!(1000)), 1);
    let alice = ClientId::new();
    let bob = ClientId::new();
    let billed = vec![
        (alice, Money::new(dec!(600))),
        (bob, Money::new(dec!(400))),
    ];

    // first payment: 500 of 1000, half of each client's share comes back
    let first = plan_receivable_payment(&doc, &billed, &pay(&doc, "500"), now).unwrap();
    assert_eq!(first.new_status, ReceivableStatus::PartiallyPaid);
    let restored_first: Money = first.restorations.iter().map(|r| r.amount).sum();
    assert_eq!(restored_first, Money::new(dec!(500)));

    doc.record_payment(first.amount, now);

    // second payment settles the rest
    let second = plan_receivable_payment(&doc, &billed, &pay(&doc, "500"), now).unwrap();
    assert_eq!(second.new_status, ReceivableStatus::Paid);
    assert!(second.new_pending_amount.is_zero());

    doc.record_payment(second.amount, now);
    assert_eq!(doc.status, ReceivableStatus::Paid);

    // total restored over both payments equals the billed total
    let restored_second: Money = second.restorations.iter().map(|r| r.amount).sum();
    assert_eq!(restored_first + restored_second, Money::new(dec!(1000)));
}

#[test]
fn voided_payment_reopens_the_document_for_collection() {
    let now = Utc::now();
    let mut doc = issued_document(Money::new(dec!(800)), 2);
    let billed = vec![(ClientId::new(), Money::new(dec!(800)))];

    let plan = plan_receivable_payment(&doc, &billed, &pay(&doc, "800"), now).unwrap();
    doc.record_payment(plan.amount, now);
    assert_eq!(doc.status, ReceivableStatus::Paid);

    let payment = ReceivablePayment {
        id: ReceivablePaymentId::new_v7(),
        document_id: doc.id,
        receipt_number: DocumentNumber::format(DocumentSeries::ReceivableReceipt, 2026, 9),
        amount: plan.amount,
        method: plan.method,
        reference: plan.reference.clone(),
        registered_by: plan.registered_by,
        paid_at: plan.paid_at,
        voided: false,
        voided_at: None,
        void_reason: None,
    };

    let void = plan_void_receivable_payment(&doc, &payment, Some("bounced".into()), now).unwrap();
    doc.unrecord_payment(void.amount, now);

    assert_eq!(doc.pending_amount, Money::new(dec!(800)));
    assert_eq!(doc.status, ReceivableStatus::Pending);

    // the document accepts a fresh payment after the void
    let again = plan_receivable_payment(&doc, &billed, &pay(&doc, "800"), now).unwrap();
    assert_eq!(again.new_status, ReceivableStatus::Paid);
}

#[test]
fn payments_are_blocked_once_a_document_is_voided() {
    let now = Utc::now();
    let mut doc = issued_document(Money::new(dec!(300)), 3);
    doc.void(Some("duplicate issue".into()), now).unwrap();

    let err = plan_receivable_payment(&doc, &[], &pay(&doc, "300"), now).unwrap_err();
    assert!(matches!(err, domain_billing::BillingError::DocumentVoided));
}

#[test]
fn document_numbers_are_distinct_within_a_series_year() {
    let a = DocumentNumber::format(DocumentSeries::Receivable, 2026, 1);
    let b = DocumentNumber::format(DocumentSeries::Receivable, 2026, 2);
    let payable = DocumentNumber::format(DocumentSeries::Payable, 2026, 1);

    assert_ne!(a, b);
    // same sequence in a different series is a different number
    assert_ne!(a.as_str(), payable.as_str());
    assert_eq!(a.as_str(), "CXC-2026-00001");
}
