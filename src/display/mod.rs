//! Display formatting for terminal output
//!
//! Every formatter returns a `String` and takes the currency symbol from
//! settings; the CLI decides where it is printed.

pub mod budget;
pub mod dashboard;
pub mod goal;
pub mod recurring;
pub mod transaction;

pub use budget::{format_budget_list, format_budget_status};
pub use dashboard::format_dashboard;
pub use goal::{format_goal_details, format_goal_list};
pub use recurring::{format_rule_details, format_rule_list, format_scheduler_report};
pub use transaction::{format_transaction_details, format_transaction_list};

use crate::models::Money;
use crate::notify::{Notice, Severity};

/// Format an amount with the configured symbol
pub fn money(amount: Money, symbol: &str) -> String {
    amount.format_with_symbol(symbol)
}

/// Truncate to `max_len` characters, marking the cut with "..."
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        ".".repeat(max_len)
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

/// A fixed-width bar such as `[#####-----]`
pub fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!(
        "[{}{}]",
        "#".repeat(filled.min(width)),
        "-".repeat(width - filled.min(width))
    )
}

/// One line per notice, prefixed by severity
pub fn format_notices(notices: &[Notice]) -> String {
    let mut output = String::new();
    for notice in notices {
        let prefix = match notice.severity {
            Severity::Info => "",
            Severity::Warning => "Warning: ",
            Severity::Error => "Error: ",
        };
        output.push_str(&format!("{}{}\n", prefix, notice.message));
    }
    output
}
