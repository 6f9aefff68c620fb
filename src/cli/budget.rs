//! Budget CLI commands
//!
//! Budgets reserve a percentage of the income in their window and split it
//! across expense categories.

use clap::Subcommand;

use crate::display::budget::{format_budget_list, format_budget_status};
use crate::error::{LedgerError, LedgerResult};
use crate::models::DateWindow;
use crate::services::BudgetService;
use crate::validation::{BudgetInput, DATE_FORMAT};

use super::CliContext;

/// Budget subcommands
#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Create a budget
    Add {
        /// Budget name
        name: String,
        /// Share of available income (e.g., "40" or "40%")
        #[arg(short, long)]
        percent: String,
        /// First day (YYYY-MM-DD), defaults to the start of this month
        #[arg(long)]
        start: Option<String>,
        /// Last day (YYYY-MM-DD), defaults to the end of this month
        #[arg(long)]
        end: Option<String>,
        /// Category share as NAME=PERCENT; repeat for each category
        #[arg(short, long = "category")]
        categories: Vec<String>,
    },
    /// List budgets
    List,
    /// Show limits and spending for a budget
    Show {
        /// Budget name or ID
        budget: String,
    },
    /// Delete a budget
    Delete {
        /// Budget name or ID
        budget: String,
    },
}

/// Handle a budget command
pub fn handle_budget_command(cx: &CliContext<'_>, cmd: BudgetCommands) -> LedgerResult<()> {
    let service = BudgetService::new(cx.services);

    match cmd {
        BudgetCommands::Add {
            name,
            percent,
            start,
            end,
            categories,
        } => {
            let month = DateWindow::month_of(cx.services.clock.today());
            let default_date = |date: Option<chrono::NaiveDate>| {
                date.map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_default()
            };

            let mut shares = Vec::with_capacity(categories.len());
            for share in &categories {
                shares.push(parse_share(share)?);
            }

            let input = BudgetInput {
                name,
                total_percent: percent,
                start_date: start.unwrap_or_else(|| default_date(month.start)),
                end_date: end.unwrap_or_else(|| default_date(month.end)),
                categories: shares,
            };
            let budget = service.create(cx.owner, input.parse()?)?;
            println!("  ID: {}", budget.id);
            print!("{}", format_budget_status(&service.status(&budget)?, cx.symbol()));
        }

        BudgetCommands::List => {
            let budgets = service.list(cx.owner)?;
            print!("{}", format_budget_list(&budgets));
        }

        BudgetCommands::Show { budget } => {
            let budget = service.find(cx.owner, &budget)?;
            print!("{}", format_budget_status(&service.status(&budget)?, cx.symbol()));
        }

        BudgetCommands::Delete { budget } => {
            let budget = service.find(cx.owner, &budget)?;
            let deleted = service.delete(cx.owner, budget.id)?;
            println!("Deleted budget '{}'", deleted.name);
        }
    }

    Ok(())
}

/// Split `Food=25` into its category and percent
fn parse_share(share: &str) -> LedgerResult<(String, String)> {
    match share.rsplit_once('=') {
        Some((category, percent)) => Ok((category.to_string(), percent.to_string())),
        None => Err(LedgerError::invalid(
            "category",
            format!("expected NAME=PERCENT, got '{}'", share),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_share() {
        assert_eq!(
            parse_share("Food & Dining=25%").unwrap(),
            ("Food & Dining".to_string(), "25%".to_string())
        );
        assert!(parse_share("Food").unwrap_err().is_validation());
    }
}
