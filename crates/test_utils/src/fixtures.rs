//! Seed data builders
//!
//! Builders produce fully wired entities with sensible defaults so scenario
//! tests only spell out what they are exercising.

use chrono::Utc;
use rust_decimal::Decimal;

use core_kernel::{CashboxId, ClientId, CompanyId, Money, ProviderId, Rate, StoreId, UserId};
use domain_ledger::{Cashbox, Client, Company, Provider, Store, UserAssignment};

use crate::memory::InMemoryStore;

/// A seeded provider → store → cashbox chain with one assigned cashier
#[derive(Debug, Clone, Copy)]
pub struct SaleNetwork {
    pub provider_id: ProviderId,
    pub store_id: StoreId,
    pub cashbox_id: CashboxId,
    pub cashier_id: UserId,
}

/// Creates a company with the given aggregate credit limit (zero = unlimited)
pub fn company(credit_limit: Decimal) -> Company {
    Company {
        id: CompanyId::new(),
        name: "Acme Industries".to_string(),
        credit_limit: Money::new(credit_limit),
        cut_day: 1,
        grace_period_days: 15,
        auto_cut: false,
        active: true,
        created_at: Utc::now(),
    }
}

/// Creates an active client with `limit` granted and fully available
pub fn client(company_id: CompanyId, limit: Decimal) -> Client {
    let now = Utc::now();
    Client {
        id: ClientId::new(),
        company_id,
        full_name: "Maria Torres".to_string(),
        balance: Money::new(limit),
        original_limit: Money::new(limit),
        active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Creates a provider charging the given commission percentage
pub fn provider(commission_percent: Decimal) -> Provider {
    Provider {
        id: ProviderId::new(),
        name: "Mercado Central".to_string(),
        commission_percent: Rate::from_percentage(commission_percent),
        active: true,
        created_at: Utc::now(),
    }
}

/// Seeds a provider/store/cashbox chain and a cashier assigned at provider
/// scope, returning the ids
pub fn seed_network(store: &InMemoryStore, commission_percent: Decimal) -> SaleNetwork {
    let p = provider(commission_percent);
    let provider_id = p.id;
    store.insert_provider(p);

    let s = Store {
        id: StoreId::new(),
        provider_id,
        name: "Sucursal Centro".to_string(),
        active: true,
    };
    let store_id = s.id;
    store.insert_store(s);

    let cb = Cashbox {
        id: CashboxId::new(),
        store_id,
        name: "Caja 1".to_string(),
        active: true,
    };
    let cashbox_id = cb.id;
    store.insert_cashbox(cb);

    let cashier_id = UserId::new();
    store.insert_assignment(UserAssignment {
        id: core_kernel::AssignmentId::new(),
        user_id: cashier_id,
        provider_id,
        store_id: None,
        cashbox_id: None,
        active: true,
    });

    SaleNetwork {
        provider_id,
        store_id,
        cashbox_id,
        cashier_id,
    }
}

/// Seeds a company and one client, returning `(company_id, client_id)`
pub fn seed_company_with_client(
    store: &InMemoryStore,
    credit_limit: Decimal,
    client_limit: Decimal,
) -> (CompanyId, ClientId) {
    let c = company(credit_limit);
    let company_id = c.id;
    store.insert_company(c);

    let cl = client(company_id, client_limit);
    let client_id = cl.id;
    store.insert_client(cl);

    (company_id, client_id)
}
