//! End-to-end scenarios over the in-memory store
//!
//! These exercise the full pipeline the way the API composes it: register
//! consumptions, run billing cycles, apply payments and refinance, asserting
//! the balance and document invariants at each step.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use core_kernel::{Clock, FixedClock, Money, Timezone};
use domain_billing::{
    ApplyReceivablePayment, BillingCycleService, BillingError, CutScheduler, GeneratePayable,
    GenerateReceivable, PaymentMethod, PaymentService, ReceivableStatus,
};
use domain_ledger::{
    CashClosureGate, CloseCashbox, ConsumptionRegister, LedgerError, RegisterConsumption,
    ReverseConsumption,
};
use domain_refinancing::{
    ApplyRefinancingPayment, CreateRefinancing, RefinancingService, RefinancingStatus,
};
use test_utils::{seed_company_with_client, seed_network, InMemoryStore};

fn timezone() -> Timezone {
    Timezone::parse("America/Mexico_City").unwrap()
}

fn clock_at(y: i32, m: u32, d: u32, h: u32) -> Arc<FixedClock> {
    Arc::new(FixedClock::at(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()))
}

struct Pipeline {
    store: InMemoryStore,
    clock: Arc<FixedClock>,
    register: ConsumptionRegister<InMemoryStore>,
    closures: CashClosureGate<InMemoryStore>,
    cycles: BillingCycleService<InMemoryStore>,
    payments: PaymentService<InMemoryStore>,
    refinancing: RefinancingService<InMemoryStore>,
}

fn pipeline() -> Pipeline {
    let store = InMemoryStore::new();
    let clock = clock_at(2026, 6, 10, 18);
    let as_clock: Arc<dyn Clock> = clock.clone();
    Pipeline {
        register: ConsumptionRegister::new(store.clone(), timezone(), as_clock.clone()),
        closures: CashClosureGate::new(store.clone(), timezone(), as_clock.clone()),
        cycles: BillingCycleService::new(store.clone(), as_clock.clone()),
        payments: PaymentService::new(store.clone(), as_clock.clone()),
        refinancing: RefinancingService::new(store.clone(), as_clock),
        store,
        clock,
    }
}

fn spend(
    network: &test_utils::SaleNetwork,
    client_id: core_kernel::ClientId,
    amount: rust_decimal::Decimal,
) -> RegisterConsumption {
    RegisterConsumption {
        client_id,
        provider_id: network.provider_id,
        store_id: network.store_id,
        cashbox_id: network.cashbox_id,
        amount: Money::new(amount),
        concept: Some("groceries".to_string()),
        reference: None,
        registered_by: network.cashier_id,
    }
}

fn period(p: &Pipeline) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    let now = p.clock.now();
    (now - Duration::days(30), now + Duration::hours(1))
}

#[tokio::test]
async fn partial_payments_restore_balances_proportionally() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(5));
    let (company_id, client_a) = seed_company_with_client(&p.store, dec!(0), dec!(1000));
    let client_b = {
        let c = test_utils::client(company_id, dec!(1000));
        let id = c.id;
        p.store.insert_client(c);
        id
    };

    p.register.register(spend(&network, client_a, dec!(600))).await.unwrap();
    p.register.register(spend(&network, client_b, dec!(400))).await.unwrap();
    assert_eq!(p.store.client_balance(client_a), Some(Money::new(dec!(400))));

    let (from, to) = period(&p);
    let issued = p
        .cycles
        .generate_receivable(GenerateReceivable {
            company_id,
            period_from: from,
            period_to: to,
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(issued.total_amount, Money::new(dec!(1000)));
    assert!(issued.document_number.as_str().starts_with("CXC-2026-"));

    // half the total: each client gets half their billed amount back
    let receipt = p
        .payments
        .apply_receivable_payment(ApplyReceivablePayment {
            document_id: issued.document_id,
            amount: Money::new(dec!(500)),
            method: PaymentMethod::Transfer,
            reference: None,
            registered_by: network.cashier_id,
        })
        .await
        .unwrap();
    assert_eq!(receipt.document_status, ReceivableStatus::PartiallyPaid);
    assert_eq!(p.store.client_balance(client_a), Some(Money::new(dec!(700))));
    assert_eq!(p.store.client_balance(client_b), Some(Money::new(dec!(800))));

    // settling the rest makes everyone whole
    let receipt = p
        .payments
        .apply_receivable_payment(ApplyReceivablePayment {
            document_id: issued.document_id,
            amount: Money::new(dec!(500)),
            method: PaymentMethod::Transfer,
            reference: None,
            registered_by: network.cashier_id,
        })
        .await
        .unwrap();
    assert_eq!(receipt.document_status, ReceivableStatus::Paid);
    assert_eq!(p.store.client_balance(client_a), Some(Money::new(dec!(1000))));
    assert_eq!(p.store.client_balance(client_b), Some(Money::new(dec!(1000))));
}

#[tokio::test]
async fn closure_blocks_only_that_cashier() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(5));
    let (_, client_id) = seed_company_with_client(&p.store, dec!(0), dec!(1000));

    // a second cashier on the same cashbox
    let other_cashier = core_kernel::UserId::new();
    p.store.insert_assignment(domain_ledger::UserAssignment {
        id: core_kernel::AssignmentId::new(),
        user_id: other_cashier,
        provider_id: network.provider_id,
        store_id: None,
        cashbox_id: None,
        active: true,
    });

    p.register.register(spend(&network, client_id, dec!(100))).await.unwrap();

    let receipt = p
        .closures
        .close(CloseCashbox {
            user_id: network.cashier_id,
            cashbox_id: network.cashbox_id,
            company_id: None,
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(receipt.totals.consumption_count, 1);
    assert_eq!(receipt.totals.total_amount, Money::new(dec!(100)));

    // closed cashier is locked out for the rest of the day
    let err = p
        .register
        .register(spend(&network, client_id, dec!(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CashboxClosed { .. }));

    // but the other cashier keeps working and closes independently
    let mut other_spend = spend(&network, client_id, dec!(50));
    other_spend.registered_by = other_cashier;
    p.register.register(other_spend).await.unwrap();

    p.closures
        .close(CloseCashbox {
            user_id: other_cashier,
            cashbox_id: network.cashbox_id,
            company_id: None,
            notes: None,
        })
        .await
        .unwrap();

    // double close is rejected
    let err = p
        .closures
        .close(CloseCashbox {
            user_id: network.cashier_id,
            cashbox_id: network.cashbox_id,
            company_id: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyClosed { .. }));
}

#[tokio::test]
async fn duplicate_period_is_rejected_but_void_frees_it() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(5));
    let (company_id, client_id) = seed_company_with_client(&p.store, dec!(0), dec!(1000));

    p.register.register(spend(&network, client_id, dec!(250))).await.unwrap();

    let (from, to) = period(&p);
    let request = GenerateReceivable {
        company_id,
        period_from: from,
        period_to: to,
        notes: None,
    };
    let issued = p.cycles.generate_receivable(request.clone()).await.unwrap();

    let err = p.cycles.generate_receivable(request.clone()).await.unwrap_err();
    assert!(matches!(err, BillingError::DuplicatePeriod));

    // voiding the document frees both the period and its consumptions
    p.payments
        .void_receivable_document(issued.document_id, Some("wrong period".to_string()))
        .await
        .unwrap();
    let reissued = p.cycles.generate_receivable(request).await.unwrap();
    assert_eq!(reissued.total_amount, Money::new(dec!(250)));
    assert_ne!(reissued.document_id, issued.document_id);
}

#[tokio::test]
async fn billed_consumptions_stay_out_of_later_cycles() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(5));
    let (company_id, client_id) = seed_company_with_client(&p.store, dec!(0), dec!(1000));

    p.register.register(spend(&network, client_id, dec!(300))).await.unwrap();
    let (from, to) = period(&p);
    p.cycles
        .generate_receivable(GenerateReceivable {
            company_id,
            period_from: from,
            period_to: to,
            notes: None,
        })
        .await
        .unwrap();

    // a wider period that includes the billed consumption has nothing new
    let err = p
        .cycles
        .generate_receivable(GenerateReceivable {
            company_id,
            period_from: from - Duration::days(1),
            period_to: to,
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::NothingToBill));
}

#[tokio::test]
async fn reversal_restores_and_is_write_once() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(5));
    let (_, client_id) = seed_company_with_client(&p.store, dec!(0), dec!(1000));

    let receipt = p
        .register
        .register(spend(&network, client_id, dec!(300)))
        .await
        .unwrap();
    assert_eq!(receipt.new_client_balance, Money::new(dec!(700)));

    let reversal = p
        .register
        .reverse(ReverseConsumption {
            consumption_id: receipt.consumption_id,
            reversed_by: network.cashier_id,
            reason: Some("mistaken entry".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(reversal.amount_restored, Money::new(dec!(300)));
    assert_eq!(reversal.new_client_balance, Money::new(dec!(1000)));

    let err = p
        .register
        .reverse(ReverseConsumption {
            consumption_id: receipt.consumption_id,
            reversed_by: network.cashier_id,
            reason: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyReversed(_)));
}

#[tokio::test]
async fn company_aggregate_limit_blocks_registration() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(5));
    let (company_id, client_a) = seed_company_with_client(&p.store, dec!(5000), dec!(4800));
    let client_b = {
        let c = test_utils::client(company_id, dec!(1000));
        let id = c.id;
        p.store.insert_client(c);
        id
    };

    p.register.register(spend(&network, client_a, dec!(4800))).await.unwrap();

    let err = p
        .register
        .register(spend(&network, client_b, dec!(300)))
        .await
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
        other => panic!("expected CompanyLimitExceeded, got {other:?}"),
    }

    // 200 still fits exactly
    p.register.register(spend(&network, client_b, dec!(200))).await.unwrap();
}

#[tokio::test]
async fn refinancing_restores_full_billed_amounts_and_tracks_source() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(5));
    let (company_id, client_id) = seed_company_with_client(&p.store, dec!(0), dec!(1000));

    p.register.register(spend(&network, client_id, dec!(1000))).await.unwrap();
    let (from, to) = period(&p);
    let issued = p
        .cycles
        .generate_receivable(GenerateReceivable {
            company_id,
            period_from: from,
            period_to: to,
            notes: None,
        })
        .await
        .unwrap();

    // company covers 300, then cannot pay the rest
    p.payments
        .apply_receivable_payment(ApplyReceivablePayment {
            document_id: issued.document_id,
            amount: Money::new(dec!(300)),
            method: PaymentMethod::Transfer,
            reference: None,
            registered_by: network.cashier_id,
        })
        .await
        .unwrap();
    assert_eq!(p.store.client_balance(client_id), Some(Money::new(dec!(300))));

    let refinanced = p
        .refinancing
        .create(CreateRefinancing {
            document_id: issued.document_id,
            new_due_date: p.clock.now() + Duration::days(60),
            reason: Some("company cash-flow shortfall".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(refinanced.original_amount, Money::new(dec!(700)));
    assert!(refinanced.refinancing_number.as_str().starts_with("REF-2026-"));

    // the employee is made whole immediately, capped at the limit
    assert_eq!(p.store.client_balance(client_id), Some(Money::new(dec!(1000))));
    let source = p.store.receivable(issued.document_id).unwrap();
    assert_eq!(source.status, ReceivableStatus::Refinanced);
    assert!(source.refinanced);

    // collecting the debt settles the source document too
    let status = p
        .refinancing
        .apply_payment(ApplyRefinancingPayment {
            refinancing_id: refinanced.refinancing_id,
            amount: Money::new(dec!(700)),
            method: PaymentMethod::Transfer,
            reference: None,
            registered_by: network.cashier_id,
        })
        .await
        .unwrap();
    assert_eq!(status, RefinancingStatus::Paid);
    let source = p.store.receivable(issued.document_id).unwrap();
    assert_eq!(source.status, ReceivableStatus::Paid);
    assert!(source.pending_amount.is_zero());
}

#[tokio::test]
async fn write_off_freezes_the_outstanding_debt() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(5));
    let (company_id, client_id) = seed_company_with_client(&p.store, dec!(0), dec!(1000));

    p.register.register(spend(&network, client_id, dec!(900))).await.unwrap();
    let (from, to) = period(&p);
    let issued = p
        .cycles
        .generate_receivable(GenerateReceivable {
            company_id,
            period_from: from,
            period_to: to,
            notes: None,
        })
        .await
        .unwrap();

    let refinanced = p
        .refinancing
        .create(CreateRefinancing {
            document_id: issued.document_id,
            new_due_date: p.clock.now() + Duration::days(30),
            reason: None,
        })
        .await
        .unwrap();

    p.refinancing
        .apply_payment(ApplyRefinancingPayment {
            refinancing_id: refinanced.refinancing_id,
            amount: Money::new(dec!(300)),
            method: PaymentMethod::Cash,
            reference: None,
            registered_by: network.cashier_id,
        })
        .await
        .unwrap();

    let lost = p
        .refinancing
        .write_off(refinanced.refinancing_id, Some("company dissolved".to_string()))
        .await
        .unwrap();
    assert_eq!(lost, Money::new(dec!(600)));

    // a written-off debt accepts no further payments
    let err = p
        .refinancing
        .apply_payment(ApplyRefinancingPayment {
            refinancing_id: refinanced.refinancing_id,
            amount: Money::new(dec!(100)),
            method: PaymentMethod::Cash,
            reference: None,
            registered_by: network.cashier_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        domain_refinancing::RefinancingError::InvalidTransition { .. }
    ));
}

#[tokio::test]
async fn payable_cycle_settles_the_provider_net() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(7.5));
    let (_, client_id) = seed_company_with_client(&p.store, dec!(0), dec!(1000));

    p.register.register(spend(&network, client_id, dec!(200))).await.unwrap();

    let (from, to) = period(&p);
    let issued = p
        .cycles
        .generate_payable(GeneratePayable {
            provider_id: network.provider_id,
            period_from: from,
            period_to: to,
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(issued.gross_total, Money::new(dec!(200)));
    assert_eq!(issued.commission_total, Money::new(dec!(15)));
    assert_eq!(issued.net_total, Money::new(dec!(185)));
    assert!(issued.document_number.as_str().starts_with("CXP-2026-"));

    let receipt = p
        .payments
        .apply_payable_payment(domain_billing::ApplyPayablePayment {
            document_id: issued.document_id,
            amount: Money::new(dec!(185)),
            method: PaymentMethod::Transfer,
            reference: Some("wire 8841".to_string()),
            registered_by: network.cashier_id,
        })
        .await
        .unwrap();
    assert_eq!(receipt.document_status, domain_billing::PayableStatus::Paid);
}

#[tokio::test]
async fn voided_payment_reopens_without_clawing_back_balances() {
    let p = pipeline();
    let network = seed_network(&p.store, dec!(5));
    let (company_id, client_id) = seed_company_with_client(&p.store, dec!(0), dec!(1000));

    p.register.register(spend(&network, client_id, dec!(400))).await.unwrap();
    let (from, to) = period(&p);
    let issued = p
        .cycles
        .generate_receivable(GenerateReceivable {
            company_id,
            period_from: from,
            period_to: to,
            notes: None,
        })
        .await
        .unwrap();

    let receipt = p
        .payments
        .apply_receivable_payment(ApplyReceivablePayment {
            document_id: issued.document_id,
            amount: Money::new(dec!(400)),
            method: PaymentMethod::Check,
            reference: None,
            registered_by: network.cashier_id,
        })
        .await
        .unwrap();
    assert_eq!(p.store.client_balance(client_id), Some(Money::new(dec!(1000))));

    // the check bounced
    let status = p
        .payments
        .void_receivable_payment(receipt.payment_id, Some("check bounced".to_string()))
        .await
        .unwrap();
    assert_eq!(status, ReceivableStatus::Pending);

    let document = p.store.receivable(issued.document_id).unwrap();
    assert_eq!(document.pending_amount, Money::new(dec!(400)));
    // restored employee balances stay put
    assert_eq!(p.store.client_balance(client_id), Some(Money::new(dec!(1000))));
}

#[tokio::test]
async fn scheduler_cuts_due_companies_once() {
    let store = InMemoryStore::new();
    let tz = timezone();
    // 18:00 UTC on June 15th is noon June 15th in central Mexico
    let clock = clock_at(2026, 6, 15, 18);
    let as_clock: Arc<dyn Clock> = clock.clone();

    let network = seed_network(&store, dec!(5));
    let mut company = test_utils::company(dec!(0));
    company.cut_day = 15;
    company.auto_cut = true;
    let company_id = company.id;
    store.insert_company(company);
    let client = test_utils::client(company_id, dec!(1000));
    let client_id = client.id;
    store.insert_client(client);

    // spend inside the cut window [May 15th, June 15th)
    clock.set(Utc.with_ymd_and_hms(2026, 6, 1, 18, 0, 0).unwrap());
    let register = ConsumptionRegister::new(store.clone(), tz, as_clock.clone());
    register
        .register(RegisterConsumption {
            client_id,
            provider_id: network.provider_id,
            store_id: network.store_id,
            cashbox_id: network.cashbox_id,
            amount: Money::new(dec!(350)),
            concept: None,
            reference: None,
            registered_by: network.cashier_id,
        })
        .await
        .unwrap();
    clock.set(Utc.with_ymd_and_hms(2026, 6, 15, 18, 0, 0).unwrap());

    let cycles = Arc::new(BillingCycleService::new(store.clone(), as_clock.clone()));
    let scheduler = CutScheduler::new(cycles, tz, as_clock);

    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.due, 1);
    assert_eq!(summary.issued, 1);
    assert_eq!(summary.failed, 0);

    // the next run finds the period already billed and skips
    let summary = scheduler.tick().await.unwrap();
    assert_eq!(summary.due, 1);
    assert_eq!(summary.issued, 0);
    assert_eq!(summary.skipped, 1);

    // a company whose cut day is not today is not touched
    assert_eq!(
        tz.business_date(Utc.with_ymd_and_hms(2026, 6, 15, 18, 0, 0).unwrap()),
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    );
}
