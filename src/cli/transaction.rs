//! Income and expense CLI commands
//!
//! `surplus income ...` and `surplus expense ...` share these subcommands;
//! the kind is fixed by the parent command.

use clap::Subcommand;

use crate::display::transaction::{format_transaction_details, format_transaction_list};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{DateWindow, KindTag, Transaction, TransactionId};
use crate::services::TransactionService;
use crate::storage::TransactionFilter;
use crate::validation::{parse_optional_date, TransactionInput};

use super::{field_error, plain_amount, CliContext};

/// Income/expense subcommands
#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record a new entry
    Add {
        /// Source (income) or name (expense)
        label: String,
        /// Amount (e.g., "1250.00" or "1250")
        amount: String,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Category
        #[arg(short, long, default_value = "General")]
        category: String,
    },
    /// List entries, newest first
    List {
        /// Earliest date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Latest date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show one entry
    Show {
        /// Transaction ID
        id: String,
    },
    /// Edit an entry
    Edit {
        /// Transaction ID
        id: String,
        /// New source or name
        #[arg(long)]
        label: Option<String>,
        /// New amount
        #[arg(short, long)]
        amount: Option<String>,
        /// New date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,
        /// New category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Delete one or more entries
    Delete {
        /// Transaction IDs
        #[arg(required_unless_present = "all")]
        ids: Vec<String>,
        /// Delete every entry of this kind
        #[arg(long, conflicts_with = "ids")]
        all: bool,
    },
}

/// Handle an income or expense command
pub fn handle_transaction_command(
    cx: &CliContext<'_>,
    kind: KindTag,
    cmd: TransactionCommands,
) -> LedgerResult<()> {
    let service = TransactionService::new(cx.services);

    match cmd {
        TransactionCommands::Add {
            label,
            amount,
            date,
            category,
        } => {
            let input = TransactionInput {
                kind,
                label,
                amount,
                date: date.unwrap_or_else(|| cx.today()),
                category,
            };
            let txn = service.create(cx.owner, input.parse()?)?;
            println!("  ID: {}", txn.id);
        }

        TransactionCommands::List { from, to, limit } => {
            let window = DateWindow {
                start: parse_optional_date("from", from.as_deref()).map_err(field_error)?,
                end: parse_optional_date("to", to.as_deref()).map_err(field_error)?,
            };
            let filter = TransactionFilter::kind(kind).within(window);
            let mut transactions = service.list(cx.owner, &filter)?;
            if let Some(limit) = limit {
                transactions.truncate(limit);
            }
            print!("{}", format_transaction_list(&transactions, cx.symbol()));
        }

        TransactionCommands::Show { id } => {
            let txn = find_of_kind(&service, cx, kind, &id)?;
            print!("{}", format_transaction_details(&txn, cx.symbol()));
        }

        TransactionCommands::Edit {
            id,
            label,
            amount,
            date,
            category,
        } => {
            let existing = find_of_kind(&service, cx, kind, &id)?;
            if label.is_none() && amount.is_none() && date.is_none() && category.is_none() {
                println!("No changes specified. Use --label, --amount, --date or --category.");
                return Ok(());
            }

            let input = TransactionInput {
                kind,
                label: label.unwrap_or_else(|| existing.kind.label().to_string()),
                amount: amount.unwrap_or_else(|| plain_amount(existing.amount)),
                date: date.unwrap_or_else(|| existing.date.format("%Y-%m-%d").to_string()),
                category: category.unwrap_or_else(|| existing.category.clone()),
            };
            let updated = service.update(cx.owner, existing.id, input.parse()?)?;
            print!("{}", format_transaction_details(&updated, cx.symbol()));
        }

        TransactionCommands::Delete { ids, all } => {
            let deleted = if all {
                service.delete_all(cx.owner, kind)?
            } else {
                let mut targets: Vec<TransactionId> = Vec::with_capacity(ids.len());
                for id in &ids {
                    targets.push(find_of_kind(&service, cx, kind, id)?.id);
                }
                service.delete_many(cx.owner, &targets)?
            };
            println!("Deleted {} entr{}", deleted.len(), if deleted.len() == 1 { "y" } else { "ies" });
        }
    }

    Ok(())
}

/// Look up a transaction, refusing one of the other kind
fn find_of_kind(
    service: &TransactionService<'_>,
    cx: &CliContext<'_>,
    kind: KindTag,
    id: &str,
) -> LedgerResult<Transaction> {
    let txn = service.find(cx.owner, id)?;
    if txn.tag() != kind {
        return Err(LedgerError::transaction_not_found(id));
    }
    Ok(txn)
}
