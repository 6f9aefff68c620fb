//! Recurring rule CLI commands

use clap::Subcommand;

use crate::display::recurring::{format_rule_details, format_rule_list, format_scheduler_report};
use crate::error::LedgerResult;
use crate::services::RecurringService;
use crate::validation::RuleInput;

use super::{plain_amount, CliContext, KindArg};

/// Recurring subcommands
#[derive(Subcommand)]
pub enum RecurringCommands {
    /// Create a recurring income or expense
    Add {
        /// income or expense
        #[arg(value_enum)]
        kind: KindArg,
        /// Source (income) or name (expense)
        label: String,
        /// Amount per occurrence
        amount: String,
        /// daily, weekly, monthly, quarterly, biannual or annual
        #[arg(short, long, default_value = "monthly")]
        frequency: String,
        /// First occurrence (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start: Option<String>,
        /// Last date an occurrence may fall on (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Category
        #[arg(short, long, default_value = "General")]
        category: String,
    },
    /// List recurring rules
    List {
        /// Only show rules of this kind
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Show one rule
    Show {
        /// Rule ID
        id: String,
    },
    /// Edit a rule; history tied to it is regenerated
    Edit {
        /// Rule ID
        id: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(short, long)]
        amount: Option<String>,
        #[arg(short, long)]
        frequency: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long, conflicts_with = "no_end")]
        end: Option<String>,
        /// Remove the end date
        #[arg(long)]
        no_end: bool,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Delete a rule; transactions it produced are kept
    Delete {
        /// Rule ID
        id: String,
    },
    /// Expense rules that are due or waiting for income
    Due,
}

/// Handle a recurring command
pub fn handle_recurring_command(cx: &CliContext<'_>, cmd: RecurringCommands) -> LedgerResult<()> {
    let service = RecurringService::new(cx.services);

    match cmd {
        RecurringCommands::Add {
            kind,
            label,
            amount,
            frequency,
            start,
            end,
            category,
        } => {
            let input = RuleInput {
                kind: kind.into(),
                label,
                amount,
                category,
                frequency,
                start_date: start.unwrap_or_else(|| cx.today()),
                end_date: end,
            };
            let rule = service.create(cx.owner, input.parse()?)?;
            println!("Created recurring {} '{}'", rule.frequency.label(), rule.kind.label());
            println!("  ID: {}", rule.id);

            // Occurrences up to today are due immediately.
            let report = service.process(cx.owner)?;
            if !report.is_quiet() {
                print!("{}", format_scheduler_report(&report, cx.symbol()));
            }
        }

        RecurringCommands::List { kind } => {
            let rules = service.list(cx.owner, kind.map(Into::into))?;
            print!("{}", format_rule_list(&rules, cx.symbol()));
        }

        RecurringCommands::Show { id } => {
            let rule = service.find(cx.owner, &id)?;
            print!("{}", format_rule_details(&rule, cx.symbol()));
        }

        RecurringCommands::Edit {
            id,
            label,
            amount,
            frequency,
            start,
            end,
            no_end,
            category,
        } => {
            let existing = service.find(cx.owner, &id)?;
            let end_date = if no_end {
                None
            } else {
                end.or_else(|| existing.end_date.map(|d| d.to_string()))
            };
            let input = RuleInput {
                kind: existing.kind.tag(),
                label: label.unwrap_or_else(|| existing.kind.label().to_string()),
                amount: amount.unwrap_or_else(|| plain_amount(existing.amount)),
                category: category.unwrap_or_else(|| existing.category.clone()),
                frequency: frequency.unwrap_or_else(|| existing.frequency.label().to_string()),
                start_date: start.unwrap_or_else(|| existing.start_date.to_string()),
                end_date,
            };

            let edit = service.edit(cx.owner, existing.id, input.parse()?)?;
            match edit.report {
                None => println!("No changes."),
                Some(report) => {
                    if !edit.removed.is_empty() {
                        println!("Discarded {} generated transaction(s)", edit.removed.len());
                    }
                    print!("{}", format_scheduler_report(&report, cx.symbol()));
                }
            }
            print!("{}", format_rule_details(&edit.rule, cx.symbol()));
        }

        RecurringCommands::Delete { id } => {
            let rule = service.find(cx.owner, &id)?;
            let deleted = service.delete(cx.owner, rule.id)?;
            println!("Deleted recurring rule '{}'", deleted.kind.label());
        }

        RecurringCommands::Due => {
            let rules = service.due_expenses(cx.owner)?;
            if rules.is_empty() {
                println!("No expenses due.");
            } else {
                print!("{}", format_rule_list(&rules, cx.symbol()));
            }
        }
    }

    Ok(())
}
