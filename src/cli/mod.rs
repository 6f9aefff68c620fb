//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod budget;
pub mod goal;
pub mod recurring;
pub mod transaction;

pub use budget::{handle_budget_command, BudgetCommands};
pub use goal::{handle_goal_command, GoalCommands};
pub use recurring::{handle_recurring_command, RecurringCommands};
pub use transaction::{handle_transaction_command, TransactionCommands};

use clap::ValueEnum;

use crate::config::Settings;
use crate::error::{FieldError, LedgerError};
use crate::models::{KindTag, Money, OwnerId};
use crate::services::ServiceContext;
use crate::validation::DATE_FORMAT;

/// What every command handler needs
#[derive(Clone, Copy)]
pub struct CliContext<'a> {
    pub services: ServiceContext<'a>,
    pub owner: OwnerId,
    pub settings: &'a Settings,
}

impl<'a> CliContext<'a> {
    pub fn symbol(&self) -> &str {
        &self.settings.currency_symbol
    }

    /// Today in the input date format, for defaulted date arguments
    pub fn today(&self) -> String {
        self.services.clock.today().format(DATE_FORMAT).to_string()
    }
}

/// Income or expense, as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Income,
    Expense,
}

impl From<KindArg> for KindTag {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Income => KindTag::Income,
            KindArg::Expense => KindTag::Expense,
        }
    }
}

pub(crate) fn field_error(err: FieldError) -> LedgerError {
    LedgerError::invalid(err.field, err.message)
}

/// An amount written back the way it would be typed
pub(crate) fn plain_amount(amount: Money) -> String {
    amount.format_with_symbol("")
}
