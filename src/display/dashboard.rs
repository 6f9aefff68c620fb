//! Dashboard display formatting

use crate::services::Dashboard;

use super::{money, progress_bar, truncate};

pub fn format_dashboard(dashboard: &Dashboard, symbol: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("Dashboard for {}\n", dashboard.today));
    output.push_str(&"=".repeat(40));
    output.push('\n');
    output.push_str(&format!(
        "  Total income:    {:>14}\n",
        money(dashboard.totals.income, symbol)
    ));
    output.push_str(&format!(
        "  Total expenses:  {:>14}\n",
        money(dashboard.totals.expense, symbol)
    ));
    output.push_str(&format!(
        "  Balance:         {:>14}\n",
        money(dashboard.balance(), symbol)
    ));
    output.push_str(&format!(
        "  This month:      {:>14}\n",
        money(dashboard.month_balance, symbol)
    ));
    output.push_str(&format!(
        "  In goals:        {:>14}\n",
        money(dashboard.allocated(), symbol)
    ));
    output.push_str(&format!(
        "  Unassigned:      {:>14}\n",
        money(dashboard.accumulated_balance, symbol)
    ));

    if !dashboard.goals.is_empty() {
        output.push_str("\nSavings goals\n");
        for goal in &dashboard.goals {
            output.push_str(&format!(
                "  {:20} {} {:>12} / {}\n",
                truncate(&goal.name, 20),
                progress_bar(goal.progress_percent(), 10),
                money(goal.current_amount, symbol),
                money(goal.target_amount, symbol)
            ));
        }
    }

    if !dashboard.due_expenses.is_empty() {
        output.push_str("\nDue expenses\n");
        for rule in &dashboard.due_expenses {
            output.push_str(&format!(
                "  {:20} {:>12}  due {}  {}\n",
                truncate(rule.kind.label(), 20),
                money(rule.amount, symbol),
                rule.next_due_date,
                rule.status
            ));
        }
    }

    output
}
