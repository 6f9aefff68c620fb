//! Recurring rule model
//!
//! A recurring rule is a template for a periodic income or expense. Its
//! `next_due_date` cursor is advanced by the scheduler as periods are
//! materialized into transactions.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::frequency::Frequency;
use super::ids::{OwnerId, RuleId};
use super::kind::Kind;
use super::money::Money;

/// Lifecycle of a recurring rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    /// Materializing normally
    #[default]
    Active,
    /// Blocked by insufficient income; retried on every scheduler pass
    Pending,
    /// Past its end date or deactivated; never materializes again
    Inactive,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Pending => write!(f, "Pending"),
            Self::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Validation errors for recurring rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleValidationError {
    NonPositiveAmount,
    AmountTooLarge,
    EmptyLabel,
    EmptyCategory,
    EndBeforeStart,
    CursorBeforeStart,
}

impl fmt::Display for RuleValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveAmount => write!(f, "Amount must be greater than zero"),
            Self::AmountTooLarge => write!(f, "Amount cannot exceed {}", Money::MAX_AMOUNT),
            Self::EmptyLabel => write!(f, "Source or name cannot be empty"),
            Self::EmptyCategory => write!(f, "Category cannot be empty"),
            Self::EndBeforeStart => write!(f, "End date cannot be before start date"),
            Self::CursorBeforeStart => write!(f, "Next due date precedes start date"),
        }
    }
}

impl std::error::Error for RuleValidationError {}

impl RuleValidationError {
    /// The input field this error refers to
    pub fn field(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount | Self::AmountTooLarge => "amount",
            Self::EmptyLabel => "label",
            Self::EmptyCategory => "category",
            Self::EndBeforeStart => "end_date",
            Self::CursorBeforeStart => "next_due_date",
        }
    }
}

/// A periodic income or expense template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringRule {
    pub id: RuleId,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub kind: Kind,
    pub amount: Money,
    pub category: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    /// Inclusive last date a period may fall on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub next_due_date: NaiveDate,
    #[serde(default)]
    pub status: RuleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringRule {
    /// Create a new active rule whose cursor starts at `start_date`
    pub fn new(
        owner_id: OwnerId,
        kind: Kind,
        amount: Money,
        category: impl Into<String>,
        frequency: Frequency,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RuleId::new(),
            owner_id,
            kind,
            amount,
            category: category.into(),
            frequency,
            start_date,
            end_date,
            next_due_date: start_date,
            status: RuleStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the cursor has reached `today` and the rule can still fire
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status != RuleStatus::Inactive && self.next_due_date <= today
    }

    /// Whether the cursor has moved past the inclusive end date
    pub fn is_exhausted(&self) -> bool {
        self.end_date.is_some_and(|end| self.next_due_date > end)
    }

    /// The date after `next_due_date` in this rule's series
    pub fn following_due_date(&self) -> Option<NaiveDate> {
        self.frequency
            .advance(self.next_due_date, self.start_date.day())
    }

    /// Move the cursor one period forward, deactivating once past the end date
    ///
    /// Returns `false` if the next date cannot be represented, in which case
    /// the rule is deactivated.
    pub fn advance(&mut self) -> bool {
        match self.following_due_date() {
            Some(next) => {
                self.next_due_date = next;
                if self.is_exhausted() {
                    self.status = RuleStatus::Inactive;
                }
                self.touch();
                true
            }
            None => {
                self.deactivate();
                false
            }
        }
    }

    /// Reset the cursor to the start of the series and reactivate
    pub fn rewind(&mut self) {
        self.next_due_date = self.start_date;
        self.status = if self.is_exhausted() {
            RuleStatus::Inactive
        } else {
            RuleStatus::Active
        };
        self.touch();
    }

    pub fn set_status(&mut self, status: RuleStatus) {
        self.status = status;
        self.touch();
    }

    pub fn deactivate(&mut self) {
        self.set_status(RuleStatus::Inactive);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Validate the rule
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if !self.amount.is_positive() {
            return Err(RuleValidationError::NonPositiveAmount);
        }
        if self.amount > Money::MAX_AMOUNT {
            return Err(RuleValidationError::AmountTooLarge);
        }
        if self.kind.label().trim().is_empty() {
            return Err(RuleValidationError::EmptyLabel);
        }
        if self.category.trim().is_empty() {
            return Err(RuleValidationError::EmptyCategory);
        }
        if self.end_date.is_some_and(|end| end < self.start_date) {
            return Err(RuleValidationError::EndBeforeStart);
        }
        if self.next_due_date < self.start_date {
            return Err(RuleValidationError::CursorBeforeStart);
        }
        Ok(())
    }
}

impl fmt::Display for RecurringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({})",
            self.kind.label(),
            self.amount,
            self.frequency,
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly_rent(end: Option<NaiveDate>) -> RecurringRule {
        RecurringRule::new(
            OwnerId::new(),
            Kind::expense("Rent"),
            Money::from_units(1200),
            "Housing & Utilities",
            Frequency::Monthly,
            date(2024, 1, 15),
            end,
        )
    }

    #[test]
    fn test_new_rule_starts_at_start_date() {
        let rule = monthly_rent(None);
        assert_eq!(rule.next_due_date, rule.start_date);
        assert_eq!(rule.status, RuleStatus::Active);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_advance_deactivates_after_end_date() {
        let mut rule = monthly_rent(Some(date(2024, 2, 15)));
        assert!(rule.advance());
        assert_eq!(rule.next_due_date, date(2024, 2, 15));
        assert_eq!(rule.status, RuleStatus::Active);

        assert!(rule.advance());
        assert_eq!(rule.next_due_date, date(2024, 3, 15));
        assert_eq!(rule.status, RuleStatus::Inactive);
    }

    #[test]
    fn test_is_due() {
        let mut rule = monthly_rent(None);
        assert!(rule.is_due(date(2024, 1, 15)));
        assert!(!rule.is_due(date(2024, 1, 14)));

        rule.deactivate();
        assert!(!rule.is_due(date(2024, 6, 1)));
    }

    #[test]
    fn test_rewind_resets_cursor() {
        let mut rule = monthly_rent(None);
        rule.advance();
        rule.set_status(RuleStatus::Pending);
        rule.rewind();
        assert_eq!(rule.next_due_date, rule.start_date);
        assert_eq!(rule.status, RuleStatus::Active);
    }

    #[test]
    fn test_validation() {
        let mut rule = monthly_rent(Some(date(2023, 12, 1)));
        assert_eq!(rule.validate(), Err(RuleValidationError::EndBeforeStart));

        rule.end_date = None;
        rule.amount = Money::zero();
        assert_eq!(rule.validate(), Err(RuleValidationError::NonPositiveAmount));

        rule.amount = Money::from_units(5);
        rule.next_due_date = date(2023, 1, 1);
        let err = rule.validate().unwrap_err();
        assert_eq!(err.field(), "next_due_date");
    }

    #[test]
    fn test_serialization() {
        let rule = monthly_rent(None);
        let json = serde_json::to_string(&rule).unwrap();
        let deserialized: RecurringRule = serde_json::from_str(&json).unwrap();
        assert_eq!(rule, deserialized);
    }
}
