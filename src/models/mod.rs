//! Core data models for the surplus ledger
//!
//! Transactions, recurring rules, savings goals, the per-owner surplus
//! tracker and percentage budgets, plus the value types they share.

pub mod budget;
pub mod frequency;
pub mod goal;
pub mod ids;
pub mod kind;
pub mod money;
pub mod recurring;
pub mod surplus;
pub mod transaction;
pub mod window;

pub use budget::{format_percent, Budget, BudgetCategory, BudgetValidationError, FULL_PERCENT_BP};
pub use frequency::Frequency;
pub use goal::{GoalFilter, GoalValidationError, Priority, SavingsGoal, FAR_FUTURE};
pub use ids::{BudgetId, GoalId, OwnerId, RuleId, TransactionId};
pub use kind::{Kind, KindTag};
pub use money::{Money, MoneyParseError};
pub use recurring::{RecurringRule, RuleStatus, RuleValidationError};
pub use surplus::SurplusTracker;
pub use transaction::{IdempotencyKey, Transaction, TransactionValidationError};
pub use window::{first_of_month, DateWindow};
