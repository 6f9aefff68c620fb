//! Budget service
//!
//! Percentage budgets reserve a share of the income available in a date
//! window. Available income is the income already recorded in the window
//! plus what the owner's live income rules will still produce there.

use chrono::NaiveDate;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Budget, BudgetId, KindTag, Money, OwnerId, RecurringRule, RuleStatus,
};
use crate::notify::{Notice, Severity};
use crate::storage::{LedgerStore, TransactionFilter};
use crate::validation::BudgetDraft;

use super::ServiceContext;

/// Spending against one category's share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStatus {
    pub category: String,
    pub percent_bp: u32,
    pub limit: Money,
    pub spent: Money,
}

impl CategoryStatus {
    pub fn remaining(&self) -> Money {
        self.limit - self.spent
    }

    pub fn is_over(&self) -> bool {
        self.spent > self.limit
    }
}

/// A budget with its computed amounts
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetStatus {
    pub budget: Budget,
    pub available_income: Money,
    pub total: Money,
    pub spent: Money,
    pub categories: Vec<CategoryStatus>,
}

impl BudgetStatus {
    pub fn remaining(&self) -> Money {
        self.total - self.spent
    }

    pub fn is_over(&self) -> bool {
        self.spent > self.total
    }

    pub fn category(&self, name: &str) -> Option<&CategoryStatus> {
        self.categories.iter().find(|c| c.category == name)
    }
}

/// Service for percentage budgets
pub struct BudgetService<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> BudgetService<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    /// Create a budget
    pub fn create(&self, owner: OwnerId, draft: BudgetDraft) -> LedgerResult<Budget> {
        let _guard = self.ctx.storage.lock_owner(owner)?;

        let mut budget = Budget::new(
            owner,
            draft.name,
            draft.total_percent_bp,
            draft.start_date,
            draft.end_date,
        );
        budget.categories = draft.categories;
        budget
            .validate()
            .map_err(|e| LedgerError::invalid(e.field(), e.to_string()))?;

        self.ctx.storage.create_budget(budget.clone())?;
        self.ctx.storage.commit()?;

        tracing::info!(owner = %owner, id = %budget.id, name = %budget.name, "budget created");
        self.ctx
            .sink
            .notify(Severity::Info, "Budget created successfully");
        Ok(budget)
    }

    pub fn get(&self, owner: OwnerId, id: BudgetId) -> LedgerResult<Budget> {
        self.ctx
            .storage
            .budgets
            .get(id)?
            .filter(|b| b.owner_id == owner)
            .ok_or_else(|| LedgerError::budget_not_found(id.to_string()))
    }

    /// Find a budget by ID string or name
    pub fn find(&self, owner: OwnerId, identifier: &str) -> LedgerResult<Budget> {
        if let Ok(id) = identifier.trim().parse::<BudgetId>() {
            return self.get(owner, id);
        }
        self.list(owner)?
            .into_iter()
            .find(|b| b.name.eq_ignore_ascii_case(identifier.trim()))
            .ok_or_else(|| LedgerError::budget_not_found(identifier))
    }

    pub fn list(&self, owner: OwnerId) -> LedgerResult<Vec<Budget>> {
        self.ctx.storage.budgets.by_owner(owner)
    }

    pub fn delete(&self, owner: OwnerId, id: BudgetId) -> LedgerResult<Budget> {
        let _guard = self.ctx.storage.lock_owner(owner)?;
        self.get(owner, id)?;
        let budget = self.ctx.storage.delete_budget(id)?;
        self.ctx.storage.commit()?;
        Ok(budget)
    }

    /// Income the budget's share is taken from
    pub fn available_income(&self, budget: &Budget) -> LedgerResult<Money> {
        let window = budget.window();
        let recorded = self.ctx.storage.sum_income(budget.owner_id, Some(window))?;
        let projected: Money = self
            .ctx
            .storage
            .rules
            .by_owner(budget.owner_id)?
            .iter()
            .map(|rule| projected_income(rule, budget.start_date, budget.end_date))
            .sum();
        Ok(recorded + projected)
    }

    /// Expense recorded against `category` inside the budget's window
    pub fn spent(&self, budget: &Budget, category: &str) -> LedgerResult<Money> {
        let filter = TransactionFilter::kind(KindTag::Expense).within(budget.window());
        Ok(self
            .ctx
            .storage
            .transactions
            .list(budget.owner_id, &filter)?
            .iter()
            .filter(|t| t.category == category)
            .map(|t| t.amount)
            .sum())
    }

    pub fn status(&self, budget: &Budget) -> LedgerResult<BudgetStatus> {
        let available_income = self.available_income(budget)?;
        let total = budget.total_amount(available_income);

        let mut categories = Vec::with_capacity(budget.categories.len());
        for share in &budget.categories {
            categories.push(CategoryStatus {
                category: share.category.clone(),
                percent_bp: share.percent_bp,
                limit: share.limit(total),
                spent: self.spent(budget, &share.category)?,
            });
        }
        let spent = categories.iter().map(|c| c.spent).sum();

        Ok(BudgetStatus {
            budget: budget.clone(),
            available_income,
            total,
            spent,
            categories,
        })
    }

    pub fn statuses(&self, owner: OwnerId) -> LedgerResult<Vec<BudgetStatus>> {
        self.list(owner)?.iter().map(|b| self.status(b)).collect()
    }

    /// Warn about every budget active today that `category` is over
    ///
    /// A category over its limit gives a warning; a budget over its total
    /// gives an error. Notices are sent to the sink and returned.
    pub fn check_warnings(&self, owner: OwnerId, category: &str) -> LedgerResult<Vec<Notice>> {
        let today = self.ctx.clock.today();
        let mut notices = Vec::new();

        for budget in self
            .ctx
            .storage
            .budgets
            .active_with_category(owner, today, category)?
        {
            let status = self.status(&budget)?;
            if let Some(share) = status.category(category).filter(|c| c.is_over()) {
                notices.push(Notice::warning(format!(
                    "You have exceeded the limit for category '{}' in budget '{}'. Spent: {}, Limit: {}",
                    category, budget.name, share.spent, share.limit
                )));
            }
            if status.is_over() {
                notices.push(Notice::new(
                    Severity::Error,
                    format!(
                        "Your total spending ({}) exceeded the budget '{}' limit ({})",
                        status.spent, budget.name, status.total
                    ),
                ));
            }
        }

        for notice in &notices {
            self.ctx.sink.deliver(notice);
        }
        Ok(notices)
    }
}

/// What `rule` will still add to income between `from` and `to`
///
/// Only the periods not yet materialized count; recorded income is already
/// in the ledger.
fn projected_income(rule: &RecurringRule, from: NaiveDate, to: NaiveDate) -> Money {
    if !rule.kind.is_income() || rule.status == RuleStatus::Inactive {
        return Money::zero();
    }
    let from = from.max(rule.next_due_date);
    let count = rule
        .frequency
        .occurrences(rule.start_date, rule.end_date, from, to)
        .len();
    rule.amount.times(count as i64)
}
