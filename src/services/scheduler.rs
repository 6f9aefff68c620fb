//! Recurrence scheduler
//!
//! Turns due recurring rules into transactions for one owner and one "today".
//! A pass runs in four stages against a running snapshot of the owner's
//! all-time totals:
//!
//! 1. due income rules, ascending id, every outstanding period
//! 2. due active expense rules, ascending id, while affordable; a rule that
//!    cannot afford its next period is parked as `Pending` without advancing
//! 3. pending expense rules, retried with the same affordability test
//! 4. stage 3 repeated until a pass changes nothing, with the number of
//!    productive passes capped by the rule count
//!
//! Materialization is idempotent: the store rejects a second transaction
//! with the same key, and the scheduler treats that as already done.

use std::fmt;

use chrono::NaiveDate;

use crate::clock::Clock;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{Change, DomainEvent};
use crate::models::{KindTag, Money, OwnerId, RecurringRule, RuleId, RuleStatus, Transaction};
use crate::notify::{NotificationSink, Severity};
use crate::storage::{LedgerStore, OwnerGuard, Storage};

use super::solvency::{BalanceDelta, SolvencyGuard, Totals};

/// What a scheduler pass did
#[derive(Debug, Clone)]
pub struct SchedulerReport {
    pub owner: OwnerId,
    pub today: NaiveDate,
    /// Transactions inserted by this pass
    pub created: Vec<Transaction>,
    /// Periods skipped because they were already materialized
    pub duplicates: usize,
    /// Expense rules still waiting for income
    pub deferred: Vec<RuleId>,
    /// Pending rules that caught up during this pass
    pub resumed: Vec<RuleId>,
    /// Rules that became inactive during this pass
    pub deactivated: Vec<RuleId>,
    /// Rules deactivated because their stored state was invalid
    pub integrity_errors: Vec<RuleId>,
    /// Pending-retry passes run, including the final quiet one
    pub retry_passes: usize,
}

impl SchedulerReport {
    fn new(owner: OwnerId, today: NaiveDate) -> Self {
        Self {
            owner,
            today,
            created: Vec::new(),
            duplicates: 0,
            deferred: Vec::new(),
            resumed: Vec::new(),
            deactivated: Vec::new(),
            integrity_errors: Vec::new(),
            retry_passes: 0,
        }
    }

    pub fn created_total(&self, kind: KindTag) -> Money {
        self.created
            .iter()
            .filter(|t| t.tag() == kind)
            .map(|t| t.amount)
            .sum()
    }

    pub fn is_quiet(&self) -> bool {
        self.created.is_empty() && self.deactivated.is_empty() && self.resumed.is_empty()
    }

    /// Events for the transactions this pass created
    pub fn events(&self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        if self.created.iter().any(|t| t.is_income()) {
            events.push(DomainEvent::IncomeRecorded {
                owner: self.owner,
                change: Change::Created,
            });
        }
        if self.created.iter().any(|t| t.is_expense()) {
            events.push(DomainEvent::ExpenseRecorded {
                owner: self.owner,
                change: Change::Created,
            });
        }
        events
    }
}

impl fmt::Display for SchedulerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} already recorded, {} deferred, {} resumed, {} deactivated",
            self.created.len(),
            self.duplicates,
            self.deferred.len(),
            self.resumed.len(),
            self.deactivated.len()
        )
    }
}

/// Outcome of trying to materialize one period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Materialized,
    AlreadyMaterialized,
    Blocked,
}

pub struct RecurrenceScheduler<'a, S: LedgerStore + ?Sized = Storage> {
    store: &'a S,
    clock: &'a dyn Clock,
    sink: &'a dyn NotificationSink,
    max_passes_per_rule: u32,
}

impl<'a, S: LedgerStore + ?Sized> RecurrenceScheduler<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock, sink: &'a dyn NotificationSink) -> Self {
        Self {
            store,
            clock,
            sink,
            max_passes_per_rule: 1,
        }
    }

    pub fn with_max_passes_per_rule(mut self, passes: u32) -> Self {
        self.max_passes_per_rule = passes.max(1);
        self
    }

    /// Process `owner` as its own unit of work
    pub fn run(&self, owner: OwnerId) -> LedgerResult<SchedulerReport> {
        let guard = self.store.lock_owner(owner)?;
        self.run_locked(&guard)
    }

    /// Process while the caller already holds the owner's guard
    pub fn run_locked(&self, guard: &OwnerGuard<'_>) -> LedgerResult<SchedulerReport> {
        let owner = guard.owner();
        let today = self.clock.today();
        let mut totals = SolvencyGuard::totals(self.store, owner, None)?;
        let mut report = SchedulerReport::new(owner, today);

        let due = self.store.list_due_rules(owner, today)?;
        let rule_count = due.len();
        tracing::debug!(owner = %owner, %today, rules = rule_count, %totals, "scheduler pass");

        let mut income = Vec::new();
        let mut active_expense = Vec::new();
        let mut pending = Vec::new();
        for rule in due {
            if let Err(err) = rule.validate() {
                self.quarantine(rule, &err.to_string(), &mut report)?;
                continue;
            }
            match (rule.status, rule.kind.tag()) {
                (RuleStatus::Inactive, _) => {}
                (_, KindTag::Income) => income.push(rule),
                (RuleStatus::Active, KindTag::Expense) => active_expense.push(rule),
                (RuleStatus::Pending, KindTag::Expense) => pending.push(rule),
            }
        }

        // Income is never blocked
        for mut rule in income {
            self.drain(&mut rule, today, &mut totals, &mut report, false)?;
            if rule.status == RuleStatus::Pending {
                rule.set_status(RuleStatus::Active);
            }
            self.store.update_rule(&rule)?;
        }

        for mut rule in active_expense {
            let caught_up = self.drain(&mut rule, today, &mut totals, &mut report, true)?;
            if !caught_up {
                tracing::debug!(rule = %rule.id, due = %rule.next_due_date, "expense deferred");
                rule.set_status(RuleStatus::Pending);
                pending.push(rule.clone());
            }
            self.store.update_rule(&rule)?;
        }

        pending.sort_by_key(|r| r.id);
        self.retry_pending(&mut pending, today, &mut totals, &mut report, rule_count)?;

        report.deferred = pending
            .iter()
            .filter(|r| r.status == RuleStatus::Pending)
            .map(|r| r.id)
            .collect();

        self.store.commit()?;
        self.announce(&report);
        Ok(report)
    }

    /// Stages 3 and 4: retry pending rules until nothing changes
    fn retry_pending(
        &self,
        pending: &mut [RecurringRule],
        today: NaiveDate,
        totals: &mut Totals,
        report: &mut SchedulerReport,
        rule_count: usize,
    ) -> LedgerResult<()> {
        let limit = (rule_count.max(1) as u64).saturating_mul(u64::from(self.max_passes_per_rule));
        let mut productive_passes = 0u64;

        loop {
            let mut transitions = 0usize;
            for rule in pending.iter_mut() {
                if rule.status != RuleStatus::Pending {
                    continue;
                }
                let before = report.created.len() + report.duplicates;
                let caught_up = self.drain(rule, today, totals, report, true)?;
                let progressed = report.created.len() + report.duplicates > before;

                if caught_up {
                    if rule.status == RuleStatus::Pending {
                        rule.set_status(RuleStatus::Active);
                    }
                    report.resumed.push(rule.id);
                }
                if caught_up || progressed {
                    transitions += 1;
                    self.store.update_rule(rule)?;
                }
            }
            report.retry_passes += 1;

            if transitions == 0 {
                return Ok(());
            }
            productive_passes += 1;
            if productive_passes > limit {
                tracing::error!(
                    owner = %report.owner,
                    passes = productive_passes,
                    limit,
                    "pending retry did not converge"
                );
                return Err(LedgerError::DataIntegrity(format!(
                    "pending retry did not reach a fixed point within {} passes",
                    limit
                )));
            }
        }
    }

    /// Materialize every due period of `rule` in order
    ///
    /// Returns `false` if an unaffordable period stopped it; the cursor then
    /// still points at that period.
    fn drain(
        &self,
        rule: &mut RecurringRule,
        today: NaiveDate,
        totals: &mut Totals,
        report: &mut SchedulerReport,
        check_funds: bool,
    ) -> LedgerResult<bool> {
        while rule.is_due(today) {
            match self.step(rule, totals, report, check_funds)? {
                Step::Blocked => return Ok(false),
                Step::Materialized | Step::AlreadyMaterialized => self.advance(rule, report),
            }
        }
        Ok(true)
    }

    fn step(
        &self,
        rule: &RecurringRule,
        totals: &mut Totals,
        report: &mut SchedulerReport,
        check_funds: bool,
    ) -> LedgerResult<Step> {
        let txn = Transaction::from_rule(rule);

        let already = match txn.idempotency_key() {
            Some(key) => self.store.has_materialized(&key)?,
            None => false,
        };
        if already {
            report.duplicates += 1;
            return Ok(Step::AlreadyMaterialized);
        }

        let delta = BalanceDelta::insertion(&txn);
        if check_funds && !SolvencyGuard::evaluate(*totals, delta).is_allowed() {
            return Ok(Step::Blocked);
        }
        let projected = SolvencyGuard::project(*totals, delta)?;

        match self.store.create_transaction(txn.clone()) {
            Ok(_) => {
                *totals = projected;
                report.created.push(txn);
                Ok(Step::Materialized)
            }
            Err(err) if err.is_constraint_violation() => {
                tracing::debug!(rule = %rule.id, date = %rule.next_due_date, "already materialized");
                report.duplicates += 1;
                Ok(Step::AlreadyMaterialized)
            }
            Err(err) => Err(err),
        }
    }

    fn advance(&self, rule: &mut RecurringRule, report: &mut SchedulerReport) {
        if !rule.advance() {
            tracing::error!(rule = %rule.id, date = %rule.next_due_date, "recurring rule cursor overflowed");
            report.integrity_errors.push(rule.id);
        }
        if rule.status == RuleStatus::Inactive {
            report.deactivated.push(rule.id);
        }
    }

    /// Force-deactivate a rule whose stored state is invalid
    fn quarantine(
        &self,
        mut rule: RecurringRule,
        problem: &str,
        report: &mut SchedulerReport,
    ) -> LedgerResult<()> {
        tracing::error!(
            rule = %rule.id,
            start = %rule.start_date,
            next_due = %rule.next_due_date,
            problem,
            "recurring rule failed integrity check, deactivating"
        );
        self.sink.notify(
            Severity::Error,
            &format!(
                "Recurring rule '{}' was deactivated: {}",
                rule.kind.label(),
                problem
            ),
        );
        rule.deactivate();
        self.store.update_rule(&rule)?;
        report.integrity_errors.push(rule.id);
        report.deactivated.push(rule.id);
        Ok(())
    }

    fn announce(&self, report: &SchedulerReport) {
        tracing::info!(owner = %report.owner, today = %report.today, "{}", report);

        if !report.created.is_empty() {
            self.sink.notify(
                Severity::Info,
                &format!(
                    "Recorded {} recurring transaction(s)",
                    report.created.len()
                ),
            );
        }
        if !report.resumed.is_empty() {
            self.sink.notify(
                Severity::Info,
                &format!("{} pending expense(s) resumed", report.resumed.len()),
            );
        }
        if !report.deferred.is_empty() {
            self.sink.notify(
                Severity::Warning,
                &format!(
                    "{} recurring expense(s) deferred to Pending: insufficient income",
                    report.deferred.len()
                ),
            );
        }
    }
}
