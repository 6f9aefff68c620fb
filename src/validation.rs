//! Input parsing for user-supplied records
//!
//! Each field is parsed into a `Result<T, FieldError>`. The `*Input` types
//! parse every field before giving up, so a single [`ValidationError`] lists
//! all failing fields at once. Nothing defaults silently.

use chrono::NaiveDate;

use crate::error::{FieldError, ValidationError};
use crate::models::{
    BudgetCategory, Frequency, Kind, KindTag, Money, Priority, FULL_PERCENT_BP,
};

/// Accepted date format
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a strictly positive amount
pub fn parse_amount(field: &'static str, input: &str) -> Result<Money, FieldError> {
    let amount = Money::parse(input).map_err(|e| FieldError::new(field, e.to_string()))?;
    if !amount.is_positive() {
        return Err(FieldError::new(field, "must be greater than zero"));
    }
    if amount > Money::MAX_AMOUNT {
        return Err(FieldError::new(
            field,
            format!("must not exceed {}", Money::MAX_AMOUNT),
        ));
    }
    Ok(amount)
}

pub fn parse_date(field: &'static str, input: &str) -> Result<NaiveDate, FieldError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| {
        FieldError::new(field, format!("invalid date '{}', expected YYYY-MM-DD", input))
    })
}

/// Parse an optional date; blank input means "not set"
pub fn parse_optional_date(
    field: &'static str,
    input: Option<&str>,
) -> Result<Option<NaiveDate>, FieldError> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(field, s).map(Some),
    }
}

pub fn parse_frequency(field: &'static str, input: &str) -> Result<Frequency, FieldError> {
    input.parse().map_err(|e: String| FieldError::new(field, e))
}

pub fn parse_priority(field: &'static str, input: &str) -> Result<Priority, FieldError> {
    input.parse().map_err(|e: String| FieldError::new(field, e))
}

/// Parse a percentage such as `12.5` or `12.5%` into basis points
pub fn parse_percent(field: &'static str, input: &str) -> Result<u32, FieldError> {
    let cleaned = input.trim().trim_end_matches('%').trim();
    let bad = || FieldError::new(field, format!("invalid percent '{}'", input));

    let (whole, frac) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(bad());
    }
    if !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
        || frac.len() > 2
    {
        return Err(bad());
    }

    let whole: u32 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| bad())?
    };
    let frac: u32 = match frac.len() {
        0 => 0,
        1 => frac.parse::<u32>().map_err(|_| bad())? * 10,
        _ => frac.parse().map_err(|_| bad())?,
    };

    let bp = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(bad)?;
    if bp > FULL_PERCENT_BP {
        return Err(FieldError::new(field, "must be between 0% and 100%"));
    }
    Ok(bp)
}

fn require_text(field: &'static str, input: &str) -> Result<String, FieldError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Err(FieldError::new(field, "cannot be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Record a failure and hand back the value if there was one
fn check<T>(errors: &mut ValidationError, result: Result<T, FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.fields.push(e);
            None
        }
    }
}

/// Raw fields for a one-off income or expense
#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub kind: KindTag,
    pub label: String,
    pub amount: String,
    pub date: String,
    pub category: String,
}

/// A parsed one-off income or expense
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub kind: Kind,
    pub amount: Money,
    pub date: NaiveDate,
    pub category: String,
}

impl TransactionInput {
    pub fn parse(&self) -> Result<TransactionDraft, ValidationError> {
        let mut errors = ValidationError::new();
        let label = check(&mut errors, require_text(label_field(self.kind), &self.label));
        let amount = check(&mut errors, parse_amount("amount", &self.amount));
        let date = check(&mut errors, parse_date("date", &self.date));
        let category = check(&mut errors, require_text("category", &self.category));

        match (label, amount, date, category) {
            (Some(label), Some(amount), Some(date), Some(category)) => Ok(TransactionDraft {
                kind: kind_for(self.kind, label),
                amount,
                date,
                category,
            }),
            _ => Err(errors),
        }
    }
}

/// Raw fields for a recurring rule
#[derive(Debug, Clone)]
pub struct RuleInput {
    pub kind: KindTag,
    pub label: String,
    pub amount: String,
    pub category: String,
    pub frequency: String,
    pub start_date: String,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    pub kind: Kind,
    pub amount: Money,
    pub category: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl RuleInput {
    pub fn parse(&self) -> Result<RuleDraft, ValidationError> {
        let mut errors = ValidationError::new();
        let label = check(&mut errors, require_text(label_field(self.kind), &self.label));
        let amount = check(&mut errors, parse_amount("amount", &self.amount));
        let category = check(&mut errors, require_text("category", &self.category));
        let frequency = check(&mut errors, parse_frequency("frequency", &self.frequency));
        let start_date = check(&mut errors, parse_date("start_date", &self.start_date));
        let end_date = check(
            &mut errors,
            parse_optional_date("end_date", self.end_date.as_deref()),
        );

        if let (Some(start), Some(Some(end))) = (start_date, end_date) {
            if end < start {
                errors.push("end_date", "cannot be before start date");
            }
        }

        match (label, amount, category, frequency, start_date, end_date) {
            (Some(label), Some(amount), Some(category), Some(frequency), Some(start), Some(end))
                if errors.is_empty() =>
            {
                Ok(RuleDraft {
                    kind: kind_for(self.kind, label),
                    amount,
                    category,
                    frequency,
                    start_date: start,
                    end_date: end,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Raw fields for a savings goal
#[derive(Debug, Clone)]
pub struct GoalInput {
    pub name: String,
    pub target_amount: String,
    pub deadline: Option<String>,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalDraft {
    pub name: String,
    pub target_amount: Money,
    pub deadline: Option<NaiveDate>,
    pub priority: Priority,
}

impl GoalInput {
    pub fn parse(&self) -> Result<GoalDraft, ValidationError> {
        let mut errors = ValidationError::new();
        let name = check(&mut errors, require_text("name", &self.name));
        let target = check(&mut errors, parse_amount("target_amount", &self.target_amount));
        let deadline = check(
            &mut errors,
            parse_optional_date("deadline", self.deadline.as_deref()),
        );
        let priority = check(&mut errors, parse_priority("priority", &self.priority));

        match (name, target, deadline, priority) {
            (Some(name), Some(target_amount), Some(deadline), Some(priority)) => Ok(GoalDraft {
                name,
                target_amount,
                deadline,
                priority,
            }),
            _ => Err(errors),
        }
    }
}

/// Raw fields for a percentage budget
#[derive(Debug, Clone)]
pub struct BudgetInput {
    pub name: String,
    pub total_percent: String,
    pub start_date: String,
    pub end_date: String,
    /// `(category, percent)` pairs
    pub categories: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetDraft {
    pub name: String,
    pub total_percent_bp: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub categories: Vec<BudgetCategory>,
}

impl BudgetInput {
    pub fn parse(&self) -> Result<BudgetDraft, ValidationError> {
        let mut errors = ValidationError::new();
        let name = check(&mut errors, require_text("name", &self.name));
        let total = check(&mut errors, parse_percent("total_percent", &self.total_percent));
        let start = check(&mut errors, parse_date("start_date", &self.start_date));
        let end = check(&mut errors, parse_date("end_date", &self.end_date));

        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                errors.push("end_date", "cannot be before start date");
            }
        }

        let mut categories = Vec::with_capacity(self.categories.len());
        for (category, percent) in &self.categories {
            let category = check(&mut errors, require_text("category", category));
            let percent = check(&mut errors, parse_percent("category_percent", percent));
            if let (Some(category), Some(percent_bp)) = (category, percent) {
                categories.push(BudgetCategory::new(category, percent_bp));
            }
        }

        match (name, total, start, end) {
            (Some(name), Some(total_percent_bp), Some(start_date), Some(end_date))
                if errors.is_empty() =>
            {
                Ok(BudgetDraft {
                    name,
                    total_percent_bp,
                    start_date,
                    end_date,
                    categories,
                })
            }
            _ => Err(errors),
        }
    }
}

fn label_field(kind: KindTag) -> &'static str {
    match kind {
        KindTag::Income => "source",
        KindTag::Expense => "name",
    }
}

fn kind_for(tag: KindTag, label: String) -> Kind {
    match tag {
        KindTag::Income => Kind::income(label),
        KindTag::Expense => Kind::expense(label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense_input(amount: &str, date: &str) -> TransactionInput {
        TransactionInput {
            kind: KindTag::Expense,
            label: "Groceries".into(),
            amount: amount.into(),
            date: date.into(),
            category: "Food & Dining".into(),
        }
    }

    #[test]
    fn test_transaction_input_parses() {
        let draft = expense_input("42.10", "2024-05-02").parse().unwrap();
        assert_eq!(draft.amount, Money::from_cents(4210));
        assert_eq!(draft.kind, Kind::expense("Groceries"));
    }

    #[test]
    fn test_every_failing_field_is_reported() {
        let err = expense_input("abc", "02/05/2024").parse().unwrap_err();
        assert!(err.has_field("amount"));
        assert!(err.has_field("date"));
        assert_eq!(err.fields.len(), 2);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let err = expense_input("0", "2024-05-02").parse().unwrap_err();
        assert!(err.has_field("amount"));
    }

    #[test]
    fn test_oversized_amount_rejected() {
        let err = expense_input("90000000000000000", "2024-05-02").parse().unwrap_err();
        assert!(err.has_field("amount"));
        assert!(parse_amount("amount", "1000000000000").is_ok());
        assert!(parse_amount("amount", "1000000000000.01").is_err());
    }

    #[test]
    fn test_rule_end_before_start() {
        let input = RuleInput {
            kind: KindTag::Income,
            label: "Employer".into(),
            amount: "3000".into(),
            category: "Salary".into(),
            frequency: "monthly".into(),
            start_date: "2024-03-01".into(),
            end_date: Some("2024-02-01".into()),
        };
        let err = input.parse().unwrap_err();
        assert!(err.has_field("end_date"));
        assert_eq!(err.fields.len(), 1);
    }

    #[test]
    fn test_rule_blank_end_date_is_open() {
        let input = RuleInput {
            kind: KindTag::Expense,
            label: "Rent".into(),
            amount: "1,200.00".into(),
            category: "Housing".into(),
            frequency: "monthly".into(),
            start_date: "2024-03-01".into(),
            end_date: Some("  ".into()),
        };
        let draft = input.parse().unwrap();
        assert_eq!(draft.end_date, None);
        assert_eq!(draft.amount, Money::from_units(1200));
    }

    #[test]
    fn test_goal_input() {
        let input = GoalInput {
            name: "".into(),
            target_amount: "-5".into(),
            deadline: Some("2025-13-01".into()),
            priority: "urgent".into(),
        };
        let err = input.parse().unwrap_err();
        for field in ["name", "target_amount", "deadline", "priority"] {
            assert!(err.has_field(field), "missing {}", field);
        }
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("p", "12.5"), Ok(1250));
        assert_eq!(parse_percent("p", "80%"), Ok(8000));
        assert_eq!(parse_percent("p", ".05"), Ok(5));
        assert!(parse_percent("p", "100.01").is_err());
        assert!(parse_percent("p", "1.234").is_err());
        assert!(parse_percent("p", "ten").is_err());
    }

    #[test]
    fn test_budget_input() {
        let input = BudgetInput {
            name: "May".into(),
            total_percent: "80".into(),
            start_date: "2024-05-01".into(),
            end_date: "2024-05-31".into(),
            categories: vec![("Food & Dining".into(), "25".into())],
        };
        let draft = input.parse().unwrap();
        assert_eq!(draft.total_percent_bp, 8000);
        assert_eq!(draft.categories[0].percent_bp, 2500);
    }
}
