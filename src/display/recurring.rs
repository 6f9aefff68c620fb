//! Recurring rule display formatting

use crate::models::{KindTag, RecurringRule, RuleStatus};
use crate::services::SchedulerReport;

use super::{money, truncate};

fn status_marker(status: RuleStatus) -> &'static str {
    match status {
        RuleStatus::Active => " ",
        RuleStatus::Pending => "…",
        RuleStatus::Inactive => "✗",
    }
}

/// Format rules as a table
pub fn format_rule_list(rules: &[RecurringRule], symbol: &str) -> String {
    if rules.is_empty() {
        return "No recurring rules found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:1} {:7}  {:20}  {:>12}  {:9}  {:10}  {:10}  {}\n",
        "", "Kind", "Source/Name", "Amount", "Every", "Next due", "Ends", "Status"
    ));
    output.push_str(&"-".repeat(92));
    output.push('\n');

    for rule in rules {
        let ends = rule
            .end_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string());
        output.push_str(&format!(
            "{:1} {:7}  {:20}  {:>12}  {:9}  {:10}  {:10}  {}\n",
            status_marker(rule.status),
            rule.kind.tag().to_string(),
            truncate(rule.kind.label(), 20),
            money(rule.amount, symbol),
            rule.frequency.label(),
            rule.next_due_date.format("%Y-%m-%d").to_string(),
            ends,
            rule.status
        ));
    }
    output
}

/// Format one rule in full
pub fn format_rule_details(rule: &RecurringRule, symbol: &str) -> String {
    let label = match rule.kind.tag() {
        KindTag::Income => "Source",
        KindTag::Expense => "Name",
    };

    let mut output = String::new();
    output.push_str(&format!("Recurring {}: {}\n", rule.kind.tag(), rule.id));
    output.push_str(&format!("  {:10} {}\n", format!("{}:", label), rule.kind.label()));
    output.push_str(&format!("  Amount:    {}\n", money(rule.amount, symbol)));
    output.push_str(&format!("  Category:  {}\n", rule.category));
    output.push_str(&format!("  Frequency: {}\n", rule.frequency));
    output.push_str(&format!("  Starts:    {}\n", rule.start_date));
    if let Some(end) = rule.end_date {
        output.push_str(&format!("  Ends:      {}\n", end));
    }
    output.push_str(&format!("  Next due:  {}\n", rule.next_due_date));
    output.push_str(&format!("  Status:    {}\n", rule.status));
    output
}

/// Summarize a scheduler pass
pub fn format_scheduler_report(report: &SchedulerReport, symbol: &str) -> String {
    if report.is_quiet() && report.deferred.is_empty() {
        return "Nothing due.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!("Processed recurring rules as of {}\n", report.today));
    output.push_str(&format!(
        "  Created:      {} ({} income, {} expense)\n",
        report.created.len(),
        money(report.created_total(KindTag::Income), symbol),
        money(report.created_total(KindTag::Expense), symbol)
    ));
    if report.duplicates > 0 {
        output.push_str(&format!("  Already done: {}\n", report.duplicates));
    }
    if !report.resumed.is_empty() {
        output.push_str(&format!("  Resumed:      {}\n", report.resumed.len()));
    }
    if !report.deferred.is_empty() {
        output.push_str(&format!("  Deferred:     {}\n", report.deferred.len()));
    }
    if !report.deactivated.is_empty() {
        output.push_str(&format!("  Finished:     {}\n", report.deactivated.len()));
    }
    output
}
