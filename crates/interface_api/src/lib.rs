//! HTTP API Layer
//!
//! This crate provides the REST API for the benefits platform using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for the ledger, billing and refinancing
//!   domains
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses with domain-driven
//!   status codes
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(pool, timezone);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod dto;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use core_kernel::{Clock, SystemClock, Timezone};
use domain_billing::{BillingCycleService, PaymentService};
use domain_ledger::{CashClosureGate, ConsumptionRegister};
use domain_refinancing::RefinancingService;
use infra_db::{PostgresBillingStore, PostgresLedgerStore, PostgresRefinancingStore};

use crate::handlers::{billing, health, ledger, refinancing};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub register: Arc<ConsumptionRegister<PostgresLedgerStore>>,
    pub closures: Arc<CashClosureGate<PostgresLedgerStore>>,
    pub cycles: Arc<BillingCycleService<PostgresBillingStore>>,
    pub payments: Arc<PaymentService<PostgresBillingStore>>,
    pub refinancing: Arc<RefinancingService<PostgresRefinancingStore>>,
    pub billing_store: PostgresBillingStore,
    pub refinancing_store: PostgresRefinancingStore,
}

impl AppState {
    /// Wires the domain services over the PostgreSQL stores
    pub fn new(pool: PgPool, timezone: Timezone) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger_store = PostgresLedgerStore::new(pool.clone());
        let billing_store = PostgresBillingStore::new(pool.clone());
        let refinancing_store = PostgresRefinancingStore::new(pool.clone());

        Self {
            pool,
            register: Arc::new(ConsumptionRegister::new(
                ledger_store.clone(),
                timezone,
                clock.clone(),
            )),
            closures: Arc::new(CashClosureGate::new(
                ledger_store,
                timezone,
                clock.clone(),
            )),
            cycles: Arc::new(BillingCycleService::new(
                billing_store.clone(),
                clock.clone(),
            )),
            payments: Arc::new(PaymentService::new(billing_store.clone(), clock.clone())),
            refinancing: Arc::new(RefinancingService::new(refinancing_store.clone(), clock)),
            billing_store,
            refinancing_store,
        }
    }
}

/// Creates the main API router
pub fn create_router(pool: PgPool, timezone: Timezone) -> Router {
    let state = AppState::new(pool, timezone);
    router_with_state(state)
}

/// Creates the router over an already wired state
pub fn router_with_state(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let consumption_routes = Router::new()
        .route("/", post(ledger::register_consumption))
        .route("/:id/reverse", post(ledger::reverse_consumption));

    let closure_routes = Router::new().route("/", post(ledger::close_cashbox));

    let receivable_routes = Router::new()
        .route("/", post(billing::generate_receivable))
        .route("/:id", get(billing::get_receivable))
        .route("/:id/payments", post(billing::pay_receivable))
        .route("/:id/void", post(billing::void_receivable));

    let payable_routes = Router::new()
        .route("/", post(billing::generate_payable))
        .route("/:id", get(billing::get_payable))
        .route("/:id/payments", post(billing::pay_payable));

    let payment_routes = Router::new()
        .route(
            "/receivable/:id/void",
            post(billing::void_receivable_payment),
        )
        .route("/payable/:id/void", post(billing::void_payable_payment));

    let refinancing_routes = Router::new()
        .route("/", post(refinancing::create_refinancing))
        .route("/:id", get(refinancing::get_refinancing))
        .route("/:id/payments", post(refinancing::pay_refinancing))
        .route("/:id/write-off", post(refinancing::write_off_refinancing));

    let api_routes = Router::new()
        .nest("/consumptions", consumption_routes)
        .nest("/closures", closure_routes)
        .nest("/receivables", receivable_routes)
        .nest("/payables", payable_routes)
        .nest("/payments", payment_routes)
        .nest("/refinancings", refinancing_routes);

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
