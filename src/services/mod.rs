//! Service layer for the surplus ledger
//!
//! Services sit on top of the storage layer and own the units of work: each
//! public mutating operation takes the owner's guard, runs its read, check
//! and write steps, commits, releases the guard and only then dispatches the
//! domain events it produced.

pub mod allocator;
pub mod budget;
pub mod dashboard;
pub mod goal;
pub mod recurring;
pub mod scheduler;
pub mod solvency;
pub mod transaction;

pub use allocator::{AllocationOutcome, AllocationPlan, GoalAllocation, GoalAllocator};
pub use budget::{BudgetService, BudgetStatus, CategoryStatus};
pub use dashboard::{Dashboard, DashboardService};
pub use goal::GoalService;
pub use recurring::RecurringService;
pub use scheduler::{RecurrenceScheduler, SchedulerReport};
pub use solvency::{BalanceDelta, SolvencyGuard, Totals, Verdict};
pub use transaction::{ImportSummary, SkippedRow, TransactionService};

use crate::clock::Clock;
use crate::error::LedgerResult;
use crate::events::{self, DomainEvent};
use crate::models::OwnerId;
use crate::notify::{NotificationSink, Severity};
use crate::storage::Storage;

/// Everything a service needs, borrowed for the length of one command
#[derive(Clone, Copy)]
pub struct ServiceContext<'a> {
    pub storage: &'a Storage,
    pub clock: &'a dyn Clock,
    pub sink: &'a dyn NotificationSink,
    pub max_passes_per_rule: u32,
}

impl<'a> ServiceContext<'a> {
    pub fn new(storage: &'a Storage, clock: &'a dyn Clock, sink: &'a dyn NotificationSink) -> Self {
        Self {
            storage,
            clock,
            sink,
            max_passes_per_rule: 1,
        }
    }

    pub fn with_max_passes_per_rule(mut self, passes: u32) -> Self {
        self.max_passes_per_rule = passes.max(1);
        self
    }

    pub fn scheduler(&self) -> RecurrenceScheduler<'a> {
        RecurrenceScheduler::new(self.storage, self.clock, self.sink)
            .with_max_passes_per_rule(self.max_passes_per_rule)
    }

    pub fn allocator(&self) -> GoalAllocator<'a> {
        GoalAllocator::new(self.storage, self.clock, self.sink)
    }

    /// Run the allocator for every owner touched by `events`
    pub fn dispatch(&self, events: &[DomainEvent]) -> LedgerResult<Vec<AllocationOutcome>> {
        events::dispatch(&self.allocator(), events)
    }

    /// Check `delta` against the owner's all-time totals
    ///
    /// A refusal is logged, reported to the sink and returned as
    /// `SolvencyViolation`. Caller must hold the owner's guard.
    pub fn ensure_solvent(&self, owner: OwnerId, delta: BalanceDelta, action: &str) -> LedgerResult<()> {
        let totals = SolvencyGuard::totals(self.storage, owner, None)?;
        let verdict = SolvencyGuard::evaluate(totals, delta);
        if let Err(err) = verdict.into_result(action) {
            tracing::warn!(owner = %owner, %totals, ?delta, "{}", err);
            self.sink.notify(Severity::Warning, &err.to_string());
            return Err(err);
        }
        SolvencyGuard::project(totals, delta)?;
        Ok(())
    }
}
