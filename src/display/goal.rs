//! Savings goal display formatting

use crate::models::{Money, SavingsGoal};

use super::{money, progress_bar, truncate};

/// Format goals as a table with progress bars
pub fn format_goal_list(goals: &[SavingsGoal], symbol: &str) -> String {
    if goals.is_empty() {
        return "No savings goals found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:20}  {:>12}  {:>12}  {:12}  {:6}  {:10}  {}\n",
        "Goal", "Saved", "Target", "Progress", "", "Deadline", "Priority"
    ));
    output.push_str(&"-".repeat(90));
    output.push('\n');

    for goal in goals {
        let deadline = goal
            .deadline
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "{:20}  {:>12}  {:>12}  {:12}  {:>5.1}%  {:10}  {}\n",
            truncate(&goal.name, 20),
            money(goal.current_amount, symbol),
            money(goal.target_amount, symbol),
            progress_bar(goal.progress_percent(), 10),
            goal.progress_percent(),
            deadline,
            goal.priority
        ));
    }

    let saved: Money = goals.iter().map(|g| g.current_amount).sum();
    let target: Money = goals.iter().map(|g| g.target_amount).sum();
    output.push_str(&"-".repeat(90));
    output.push('\n');
    output.push_str(&format!(
        "{:20}  {:>12}  {:>12}\n",
        "TOTAL",
        money(saved, symbol),
        money(target, symbol)
    ));
    output
}

/// Format one goal in full
pub fn format_goal_details(goal: &SavingsGoal, symbol: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!("Savings goal: {}\n", goal.name));
    output.push_str(&format!("  ID:        {}\n", goal.id));
    output.push_str(&format!("  Target:    {}\n", money(goal.target_amount, symbol)));
    output.push_str(&format!("  Saved:     {}\n", money(goal.current_amount, symbol)));
    output.push_str(&format!("  Remaining: {}\n", money(goal.remaining(), symbol)));
    output.push_str(&format!(
        "  Progress:  {} {:.1}%\n",
        progress_bar(goal.progress_percent(), 20),
        goal.progress_percent()
    ));
    if let Some(deadline) = goal.deadline {
        output.push_str(&format!("  Deadline:  {}\n", deadline));
    }
    output.push_str(&format!("  Priority:  {}\n", goal.priority));
    if goal.is_completed() {
        output.push_str("  Completed\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OwnerId, Priority};

    fn half_funded() -> SavingsGoal {
        let mut goal = SavingsGoal::new(
            OwnerId::new(),
            "Bike",
            Money::from_units(400),
            None,
            Priority::High,
        );
        goal.current_amount = Money::from_units(200);
        goal
    }

    #[test]
    fn test_list() {
        let output = format_goal_list(&[half_funded()], "$");
        assert!(output.contains("[#####-----]"));
        assert!(output.contains(" 50.0%"));
        assert!(output.contains("High"));
    }

    #[test]
    fn test_details() {
        let output = format_goal_details(&half_funded(), "$");
        assert!(output.contains("Remaining: $200.00"));
        assert!(!output.contains("Completed"));
    }
}
