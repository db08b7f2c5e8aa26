//! Scheduled billing cuts
//!
//! Companies with `auto_cut` enabled get their receivable document issued
//! unattended on their cut day. The scheduler wakes on a fixed interval,
//! computes the business date in the platform timezone, and runs the cut for
//! every company whose day it is. A tick is idempotent: re-running on the
//! same day hits the duplicate-period guard and skips, so the interval can
//! be much shorter than a day without double billing.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, error, info, instrument};

use core_kernel::{one_month_before, Clock, Timezone};

use crate::cycle::{BillingCycleService, GenerateReceivable};
use crate::error::BillingError;
use crate::ports::BillingStore;

/// Default wake interval between cut ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Outcome counters of one scheduler tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CutRunSummary {
    /// Companies whose cut day matched today
    pub due: u32,
    /// Documents actually issued
    pub issued: u32,
    /// Cuts skipped (already billed or nothing to bill)
    pub skipped: u32,
    /// Cuts that failed with a real error
    pub failed: u32,
}

/// Issues scheduled cuts for auto-cut companies
pub struct CutScheduler<S> {
    cycles: Arc<BillingCycleService<S>>,
    timezone: Timezone,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl<S: BillingStore> CutScheduler<S> {
    pub fn new(
        cycles: Arc<BillingCycleService<S>>,
        timezone: Timezone,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cycles,
            timezone,
            clock,
            interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs the scheduler loop until the task is dropped
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs(), "cut scheduler started");
        loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(summary) if summary.due > 0 => {
                    info!(
                        due = summary.due,
                        issued = summary.issued,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "cut tick finished"
                    );
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "cut tick failed"),
            }
        }
    }

    /// Runs one pass over the auto-cut companies
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<CutRunSummary, BillingError> {
        let today = self.timezone.business_date(self.clock.now());
        let (period_from, period_to) = self.cut_window(today);
        let companies = self.cycles.store().auto_cut_companies().await?;

        let mut summary = CutRunSummary::default();
        for company in companies {
            if !company.is_cut_due(today) {
                continue;
            }
            summary.due += 1;

            let request = GenerateReceivable {
                company_id: company.id,
                period_from,
                period_to,
                notes: Some(format!("Scheduled cut {today}")),
            };
            match self.cycles.generate_receivable(request).await {
                Ok(_) => summary.issued += 1,
                Err(BillingError::DuplicatePeriod) | Err(BillingError::NothingToBill) => {
                    debug!(company_id = %company.id, "cut skipped");
                    summary.skipped += 1;
                }
                Err(err) => {
                    error!(company_id = %company.id, error = %err, "cut failed");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// The billing window for a cut on `today`: the preceding calendar month
    /// as a half-open UTC interval
    pub fn cut_window(
        &self,
        today: NaiveDate,
    ) -> (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) {
        let from = self.timezone.start_of_day(one_month_before(today));
        let to = self.timezone.start_of_day(today);
        (from, to)
    }
}
