//! Budget display formatting

use crate::models::{format_percent, Budget};
use crate::services::BudgetStatus;

use super::{money, truncate};

pub fn format_budget_list(budgets: &[Budget]) -> String {
    if budgets.is_empty() {
        return "No budgets found.\n".to_string();
    }

    let mut output = String::new();
    for budget in budgets {
        output.push_str(&format!(
            "{:24}  {} to {}  {:>8}  {} categories\n",
            truncate(&budget.name, 24),
            budget.start_date,
            budget.end_date,
            format_percent(budget.total_percent_bp),
            budget.categories.len()
        ));
    }
    output
}

/// Format a budget with its limits and spending
pub fn format_budget_status(status: &BudgetStatus, symbol: &str) -> String {
    let budget = &status.budget;
    let mut output = String::new();

    output.push_str(&format!(
        "Budget: {} ({} to {})\n",
        budget.name, budget.start_date, budget.end_date
    ));
    output.push_str(&format!(
        "  Available income: {}\n",
        money(status.available_income, symbol)
    ));
    output.push_str(&format!(
        "  Budget total:     {} ({} of income)\n",
        money(status.total, symbol),
        format_percent(budget.total_percent_bp)
    ));
    output.push_str(&format!("  Spent:            {}\n", money(status.spent, symbol)));
    output.push_str(&format!("  Remaining:        {}\n", money(status.remaining(), symbol)));
    output.push('\n');

    if status.categories.is_empty() {
        output.push_str("  No categories.\n");
        return output;
    }

    output.push_str(&format!(
        "  {:20}  {:>8}  {:>12}  {:>12}  {:>12}\n",
        "Category", "Share", "Limit", "Spent", "Remaining"
    ));
    for category in &status.categories {
        let flag = if category.is_over() { "  over" } else { "" };
        output.push_str(&format!(
            "  {:20}  {:>8}  {:>12}  {:>12}  {:>12}{}\n",
            truncate(&category.category, 20),
            format_percent(category.percent_bp),
            money(category.limit, symbol),
            money(category.spent, symbol),
            money(category.remaining(), symbol),
            flag
        ));
    }
    if status.is_over() {
        output.push_str("\n  Total spending exceeds the budget.\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, OwnerId};
    use crate::services::CategoryStatus;
    use chrono::NaiveDate;

    #[test]
    fn test_status_flags_overspent_category() {
        let budget = Budget::new(
            OwnerId::new(),
            "May",
            5000,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        );
        let status = BudgetStatus {
            budget,
            available_income: Money::from_units(1000),
            total: Money::from_units(500),
            spent: Money::from_units(300),
            categories: vec![CategoryStatus {
                category: "Food".into(),
                percent_bp: 5000,
                limit: Money::from_units(250),
                spent: Money::from_units(300),
            }],
        };

        let output = format_budget_status(&status, "$");
        assert!(output.contains("Remaining:        $200.00"));
        assert!(output.contains("over"));
        assert!(!output.contains("exceeds the budget"));
    }
}
