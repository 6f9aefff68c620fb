//! Recurring rule service
//!
//! Rule management plus the entry point that runs the scheduler. Editing a
//! rule's core fields regenerates its history: transactions it produced are
//! discarded, the cursor goes back to the start date and the scheduler
//! re-materializes within the same unit of work.

use crate::error::{LedgerError, LedgerResult};
use crate::events::{Change, DomainEvent};
use crate::models::{KindTag, OwnerId, RecurringRule, RuleId, RuleStatus, Transaction};
use crate::notify::Severity;
use crate::storage::{LedgerStore, OwnerGuard};
use crate::validation::RuleDraft;

use super::scheduler::SchedulerReport;
use super::solvency::BalanceDelta;
use super::ServiceContext;

/// Result of editing a rule
#[derive(Debug, Clone)]
pub struct RuleEdit {
    pub rule: RecurringRule,
    /// Materialized transactions discarded by the edit
    pub removed: Vec<Transaction>,
    /// The scheduler pass that regenerated history; `None` if nothing changed
    pub report: Option<SchedulerReport>,
}

/// Service for recurring income and expense rules
pub struct RecurringService<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> RecurringService<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    /// Create a rule; its cursor starts at the start date
    pub fn create(&self, owner: OwnerId, draft: RuleDraft) -> LedgerResult<RecurringRule> {
        let _guard = self.ctx.storage.lock_owner(owner)?;

        let rule = RecurringRule::new(
            owner,
            draft.kind,
            draft.amount,
            draft.category,
            draft.frequency,
            draft.start_date,
            draft.end_date,
        );
        rule.validate()
            .map_err(|e| LedgerError::invalid(e.field(), e.to_string()))?;

        self.ctx.storage.create_rule(rule.clone())?;
        self.ctx.storage.commit()?;

        tracing::info!(owner = %owner, id = %rule.id, kind = %rule.kind.tag(), "recurring rule created");
        self.ctx.sink.notify(
            Severity::Info,
            &format!("Recurring {} added successfully", noun(rule.kind.tag())),
        );
        Ok(rule)
    }

    pub fn get(&self, owner: OwnerId, id: RuleId) -> LedgerResult<RecurringRule> {
        self.ctx
            .storage
            .rules
            .get(id)?
            .filter(|r| r.owner_id == owner)
            .ok_or_else(|| LedgerError::rule_not_found(id.to_string()))
    }

    pub fn find(&self, owner: OwnerId, identifier: &str) -> LedgerResult<RecurringRule> {
        let id = identifier
            .trim()
            .parse::<RuleId>()
            .map_err(|_| LedgerError::rule_not_found(identifier))?;
        self.get(owner, id)
    }

    /// The owner's rules, optionally of one kind, ascending id
    pub fn list(&self, owner: OwnerId, kind: Option<KindTag>) -> LedgerResult<Vec<RecurringRule>> {
        Ok(self
            .ctx
            .storage
            .rules
            .by_owner(owner)?
            .into_iter()
            .filter(|r| kind.map_or(true, |k| r.kind.tag() == k))
            .collect())
    }

    /// Expense rules still waiting to be paid as of today
    pub fn due_expenses(&self, owner: OwnerId) -> LedgerResult<Vec<RecurringRule>> {
        let today = self.ctx.clock.today();
        Ok(self
            .ctx
            .storage
            .rules
            .due(owner, today)?
            .into_iter()
            .filter(|r| r.kind.is_expense())
            .collect())
    }

    /// Materialize everything due for `owner` and re-run allocation
    pub fn process(&self, owner: OwnerId) -> LedgerResult<SchedulerReport> {
        let report = self.ctx.scheduler().run(owner)?;
        self.ctx.dispatch(&report.events())?;
        Ok(report)
    }

    /// Change a rule's core fields and regenerate its history
    ///
    /// The direction cannot change. Editing an income rule is refused if the
    /// income it would regenerate up to today no longer covers expenses.
    pub fn edit(&self, owner: OwnerId, id: RuleId, draft: RuleDraft) -> LedgerResult<RuleEdit> {
        let edit = {
            let guard = self.ctx.storage.lock_owner(owner)?;
            self.edit_locked(&guard, id, draft)?
        };

        if edit.report.is_some() {
            let mut events: Vec<DomainEvent> = Vec::new();
            for txn in &edit.removed {
                let event = DomainEvent::for_transaction(txn, Change::Deleted);
                if !events.contains(&event) {
                    events.push(event);
                }
            }
            if let Some(report) = &edit.report {
                events.extend(report.events());
            }
            self.ctx.dispatch(&events)?;
            self.ctx.sink.notify(
                Severity::Info,
                &format!(
                    "Recurring {} updated successfully. Transactions regenerated.",
                    noun(edit.rule.kind.tag())
                ),
            );
        }
        Ok(edit)
    }

    fn edit_locked(&self, guard: &OwnerGuard<'_>, id: RuleId, draft: RuleDraft) -> LedgerResult<RuleEdit> {
        let owner = guard.owner();
        let before = self.get(owner, id)?;

        if draft.kind.tag() != before.kind.tag() {
            return Err(LedgerError::invalid(
                "kind",
                format!(
                    "a recurring {} cannot be changed into a recurring {}",
                    noun(before.kind.tag()),
                    noun(draft.kind.tag())
                ),
            ));
        }

        let unchanged = draft.kind == before.kind
            && draft.amount == before.amount
            && draft.category == before.category
            && draft.frequency == before.frequency
            && draft.start_date == before.start_date
            && draft.end_date == before.end_date;
        if unchanged {
            return Ok(RuleEdit {
                rule: before,
                removed: Vec::new(),
                report: None,
            });
        }

        let mut rule = before.clone();
        rule.kind = draft.kind;
        rule.amount = draft.amount;
        rule.category = draft.category;
        rule.frequency = draft.frequency;
        rule.start_date = draft.start_date;
        rule.end_date = draft.end_date;
        rule.rewind();
        rule.validate()
            .map_err(|e| LedgerError::invalid(e.field(), e.to_string()))?;

        let materialized = self.ctx.storage.transactions.by_rule(id)?;
        let mut delta: BalanceDelta = materialized.iter().map(BalanceDelta::removal).sum();
        if rule.kind.is_income() {
            let today = self.ctx.clock.today();
            let periods = rule
                .frequency
                .occurrences(rule.start_date, rule.end_date, rule.start_date, today)
                .len();
            let regenerated = rule.amount.checked_times(periods as i64).ok_or_else(|| {
                LedgerError::invalid("amount", "regenerated income exceeds the supported range")
            })?;
            delta += BalanceDelta::add_income(regenerated);
        }
        self.ctx
            .ensure_solvent(owner, delta, &format!("Cannot update recurring {}", noun(rule.kind.tag())))?;

        let mut removed = Vec::with_capacity(materialized.len());
        for txn in &materialized {
            removed.push(self.ctx.storage.delete_transaction(txn.id)?);
        }
        self.ctx.storage.update_rule(&rule)?;

        tracing::info!(
            owner = %owner,
            rule = %rule.id,
            removed = removed.len(),
            "recurring rule edited, regenerating"
        );
        let report = self.ctx.scheduler().run_locked(guard)?;

        Ok(RuleEdit {
            rule: self.get(owner, id)?,
            removed,
            report: Some(report),
        })
    }

    /// Stop a rule, keeping the transactions it already produced
    pub fn delete(&self, owner: OwnerId, id: RuleId) -> LedgerResult<RecurringRule> {
        let _guard = self.ctx.storage.lock_owner(owner)?;
        let rule = self.get(owner, id)?;

        for txn in self.ctx.storage.transactions.by_rule(id)? {
            let mut detached = txn.clone();
            detached.rule_id = None;
            detached.touch();
            self.ctx.storage.update_transaction(&txn, detached)?;
        }
        self.ctx.storage.delete_rule(rule.id)?;
        self.ctx.storage.commit()?;

        tracing::info!(owner = %owner, rule = %id, "recurring rule deleted");
        self.ctx.sink.notify(
            Severity::Info,
            &format!("Recurring {} deleted successfully", noun(rule.kind.tag())),
        );
        Ok(rule)
    }

    /// Rules waiting for income
    pub fn pending(&self, owner: OwnerId) -> LedgerResult<Vec<RecurringRule>> {
        self.ctx.storage.rules.with_status(owner, RuleStatus::Pending)
    }
}

fn noun(kind: KindTag) -> &'static str {
    match kind {
        KindTag::Income => "income",
        KindTag::Expense => "expense",
    }
}
