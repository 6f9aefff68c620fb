//! Transaction display formatting

use crate::models::{Money, Transaction};

use super::{money, truncate};

/// Format a list of transactions as a register
pub fn format_transaction_list(transactions: &[Transaction], symbol: &str) -> String {
    if transactions.is_empty() {
        return "No transactions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:10}  {:24}  {:16}  {:>12}  {}\n",
        "Date", "Source/Name", "Category", "Amount", "ID"
    ));
    output.push_str(&"-".repeat(80));
    output.push('\n');

    for txn in transactions {
        let recurring = if txn.rule_id.is_some() { "↻ " } else { "" };
        output.push_str(&format!(
            "{:10}  {:24}  {:16}  {:>12}  {}\n",
            txn.date.format("%Y-%m-%d"),
            truncate(&format!("{}{}", recurring, txn.kind.label()), 24),
            truncate(&txn.category, 16),
            money(txn.amount, symbol),
            txn.id
        ));
    }

    let total: Money = transactions.iter().map(|t| t.amount).sum();
    output.push_str(&"-".repeat(80));
    output.push('\n');
    output.push_str(&format!(
        "{:10}  {:24}  {:16}  {:>12}\n",
        "",
        format!("{} entries", transactions.len()),
        "TOTAL",
        money(total, symbol)
    ));
    output
}

/// Format transaction details for display
pub fn format_transaction_details(txn: &Transaction, symbol: &str) -> String {
    let label = if txn.is_income() { "Source" } else { "Name" };

    let mut output = String::new();
    output.push_str(&format!("{}: {}\n", txn.tag(), txn.id));
    output.push_str(&format!("  {:9} {}\n", format!("{}:", label), txn.kind.label()));
    output.push_str(&format!("  Date:     {}\n", txn.date.format("%Y-%m-%d")));
    output.push_str(&format!("  Amount:   {}\n", money(txn.amount, symbol)));
    output.push_str(&format!("  Category: {}\n", txn.category));
    if let Some(rule_id) = txn.rule_id {
        output.push_str(&format!("  Rule:     {}\n", rule_id));
    }
    output
}
