//! Savings goal CLI commands

use clap::Subcommand;

use crate::display::goal::{format_goal_details, format_goal_list};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{GoalFilter, GoalId};
use crate::services::GoalService;
use crate::validation::GoalInput;

use super::{plain_amount, CliContext};

/// Goal subcommands
#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a savings goal
    Add {
        /// Goal name
        name: String,
        /// Target amount
        target: String,
        /// Deadline (YYYY-MM-DD)
        #[arg(short, long)]
        deadline: Option<String>,
        /// high, medium or low
        #[arg(short, long, default_value = "medium")]
        priority: String,
    },
    /// List goals in funding order
    List {
        /// all, active or completed
        #[arg(short, long, default_value = "all")]
        filter: String,
    },
    /// Show one goal
    Show {
        /// Goal name or ID
        goal: String,
    },
    /// Edit a goal
    Edit {
        /// Goal name or ID
        goal: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        target: Option<String>,
        #[arg(short, long, conflicts_with = "no_deadline")]
        deadline: Option<String>,
        /// Remove the deadline
        #[arg(long)]
        no_deadline: bool,
        #[arg(short, long)]
        priority: Option<String>,
    },
    /// Delete goals; their savings return to the unassigned balance
    Delete {
        /// Goal names or IDs
        #[arg(required_unless_present = "all")]
        goals: Vec<String>,
        /// Delete every goal
        #[arg(long, conflicts_with = "goals")]
        all: bool,
    },
}

/// Handle a goal command
pub fn handle_goal_command(cx: &CliContext<'_>, cmd: GoalCommands) -> LedgerResult<()> {
    let service = GoalService::new(cx.services);

    match cmd {
        GoalCommands::Add {
            name,
            target,
            deadline,
            priority,
        } => {
            let input = GoalInput {
                name,
                target_amount: target,
                deadline,
                priority,
            };
            let goal = service.create(cx.owner, input.parse()?)?;
            print!("{}", format_goal_details(&goal, cx.symbol()));
        }

        GoalCommands::List { filter } => {
            let filter: GoalFilter = filter
                .parse()
                .map_err(|e: String| LedgerError::invalid("filter", e))?;
            let goals = service.list(cx.owner, filter)?;
            print!("{}", format_goal_list(&goals, cx.symbol()));
        }

        GoalCommands::Show { goal } => {
            let goal = service.find(cx.owner, &goal)?;
            print!("{}", format_goal_details(&goal, cx.symbol()));
        }

        GoalCommands::Edit {
            goal,
            name,
            target,
            deadline,
            no_deadline,
            priority,
        } => {
            let existing = service.find(cx.owner, &goal)?;
            let deadline = if no_deadline {
                None
            } else {
                deadline.or_else(|| existing.deadline.map(|d| d.to_string()))
            };
            let input = GoalInput {
                name: name.unwrap_or_else(|| existing.name.clone()),
                target_amount: target.unwrap_or_else(|| plain_amount(existing.target_amount)),
                deadline,
                priority: priority.unwrap_or_else(|| existing.priority.to_string()),
            };
            let updated = service.update(cx.owner, existing.id, input.parse()?)?;
            print!("{}", format_goal_details(&updated, cx.symbol()));
        }

        GoalCommands::Delete { goals, all } => {
            let deleted = if all {
                service.delete_all(cx.owner)?
            } else {
                let mut ids: Vec<GoalId> = Vec::with_capacity(goals.len());
                for goal in &goals {
                    ids.push(service.find(cx.owner, goal)?.id);
                }
                service.delete_many(cx.owner, &ids)?
            };
            for goal in &deleted {
                println!("Deleted savings goal '{}'", goal.name);
            }
        }
    }

    Ok(())
}
