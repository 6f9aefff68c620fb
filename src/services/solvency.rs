//! Solvency guard
//!
//! Decides whether a proposed change keeps `total_expense <= total_income`
//! for an owner. [`SolvencyGuard::evaluate`] is a pure function of the
//! current totals and a delta; it never writes anything. The aggregate
//! helpers read totals through [`LedgerStore`] so every caller agrees on
//! what "available balance" means.

use std::fmt;

use chrono::NaiveDate;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{first_of_month, DateWindow, Money, OwnerId, Transaction};
use crate::storage::LedgerStore;

/// Income and expense totals for one owner over some window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub income: Money,
    pub expense: Money,
}

impl Totals {
    pub fn new(income: Money, expense: Money) -> Self {
        Self { income, expense }
    }

    /// `income - expense`; never negative while the invariant holds
    pub fn balance(&self) -> Money {
        self.income - self.expense
    }

    pub fn is_solvent(&self) -> bool {
        self.expense <= self.income
    }

    pub fn apply(&mut self, delta: BalanceDelta) {
        self.income += delta.income;
        self.expense += delta.expense;
    }

    pub fn after(mut self, delta: BalanceDelta) -> Self {
        self.apply(delta);
        self
    }

    /// Like [`Totals::after`], but `None` if a total leaves the `i64` range
    pub fn checked_after(self, delta: BalanceDelta) -> Option<Self> {
        Some(Self {
            income: self.income.checked_add(delta.income)?,
            expense: self.expense.checked_add(delta.expense)?,
        })
    }
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "income {} / expense {}", self.income, self.expense)
    }
}

/// Signed change to an owner's totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceDelta {
    pub income: Money,
    pub expense: Money,
}

impl BalanceDelta {
    pub fn add_income(amount: Money) -> Self {
        Self {
            income: amount,
            expense: Money::zero(),
        }
    }

    pub fn add_expense(amount: Money) -> Self {
        Self {
            income: Money::zero(),
            expense: amount,
        }
    }

    /// The effect of inserting `txn`
    pub fn insertion(txn: &Transaction) -> Self {
        if txn.is_income() {
            Self::add_income(txn.amount)
        } else {
            Self::add_expense(txn.amount)
        }
    }

    /// The effect of deleting `txn`
    pub fn removal(txn: &Transaction) -> Self {
        -Self::insertion(txn)
    }

    /// The effect of replacing `before` with `after`
    pub fn replacement(before: &Transaction, after: &Transaction) -> Self {
        Self::removal(before) + Self::insertion(after)
    }

    /// Whether this change can only help solvency
    pub fn is_relief(&self) -> bool {
        !self.income.is_negative() && !self.expense.is_positive()
    }
}

impl std::ops::Add for BalanceDelta {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            income: self.income + rhs.income,
            expense: self.expense + rhs.expense,
        }
    }
}

impl std::ops::AddAssign for BalanceDelta {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Neg for BalanceDelta {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            income: -self.income,
            expense: -self.expense,
        }
    }
}

impl std::iter::Sum for BalanceDelta {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, d| acc + d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Expense would exceed income by `shortfall`
    Reject { shortfall: Money },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Turn a rejection into a refused operation described by `action`
    pub fn into_result(self, action: &str) -> LedgerResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Reject { shortfall } => Err(LedgerError::SolvencyViolation {
                reason: format!(
                    "{}: total expenses would exceed total income by {}",
                    action, shortfall
                ),
                shortfall,
            }),
        }
    }
}

/// Stateless invariant check
pub struct SolvencyGuard;

impl SolvencyGuard {
    /// Judge `delta` against `totals`
    ///
    /// Relief (more income or less expense) is always allowed, even if the
    /// totals are already out of balance.
    pub fn evaluate(totals: Totals, delta: BalanceDelta) -> Verdict {
        if delta.is_relief() {
            return Verdict::Allow;
        }
        // Widened so a huge delta is judged rather than wrapped
        let income = i128::from(totals.income.cents()) + i128::from(delta.income.cents());
        let expense = i128::from(totals.expense.cents()) + i128::from(delta.expense.cents());
        if expense <= income {
            Verdict::Allow
        } else {
            let shortfall = i64::try_from(expense - income).unwrap_or(i64::MAX);
            Verdict::Reject {
                shortfall: Money::from_cents(shortfall),
            }
        }
    }

    /// Totals after `delta`, refusing a change no total can represent
    pub fn project(totals: Totals, delta: BalanceDelta) -> LedgerResult<Totals> {
        totals.checked_after(delta).ok_or_else(|| {
            LedgerError::invalid(
                "amount",
                format!("totals would exceed {}", Money::from_cents(i64::MAX)),
            )
        })
    }

    /// Totals for `owner`; `None` means all time
    pub fn totals<S: LedgerStore + ?Sized>(
        store: &S,
        owner: OwnerId,
        window: Option<DateWindow>,
    ) -> LedgerResult<Totals> {
        Ok(Totals {
            income: store.sum_income(owner, window)?,
            expense: store.sum_expense(owner, window)?,
        })
    }

    /// `income - expense` for every date before the month containing `today`
    pub fn closed_period_surplus<S: LedgerStore + ?Sized>(
        store: &S,
        owner: OwnerId,
        today: NaiveDate,
    ) -> LedgerResult<Money> {
        let closed = DateWindow::before(first_of_month(today));
        Ok(Self::totals(store, owner, Some(closed))?.balance())
    }

    /// The current month's balance, floored at zero
    pub fn month_balance<S: LedgerStore + ?Sized>(
        store: &S,
        owner: OwnerId,
        today: NaiveDate,
    ) -> LedgerResult<Money> {
        let month = DateWindow::month_of(today);
        Ok(Self::totals(store, owner, Some(month))?.balance().max_zero())
    }
}
