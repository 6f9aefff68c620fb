//! Savings goal model
//!
//! A goal's `current_amount` is derived state: the allocator overwrites it on
//! every run, so callers never add to it directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::ids::{GoalId, OwnerId};
use super::money::Money;

/// Deadline used for ordering goals that have none
pub const FAR_FUTURE: NaiveDate = NaiveDate::MAX;

/// Goal priority; `High` is funded first among equal deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Ordinal used for ordering: High < Medium < Low
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::Low => write!(f, "Low"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "h" => Ok(Self::High),
            "medium" | "m" => Ok(Self::Medium),
            "low" | "l" => Ok(Self::Low),
            other => Err(format!(
                "unknown priority '{}' (expected high, medium or low)",
                other
            )),
        }
    }
}

/// Which goals a listing should include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoalFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl GoalFilter {
    pub fn matches(&self, goal: &SavingsGoal) -> bool {
        match self {
            Self::All => true,
            Self::Active => !goal.is_completed(),
            Self::Completed => goal.is_completed(),
        }
    }
}

impl FromStr for GoalFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" | "done" => Ok(Self::Completed),
            other => Err(format!("unknown goal filter '{}'", other)),
        }
    }
}

/// Validation errors for savings goals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalValidationError {
    EmptyName,
    NonPositiveTarget,
    TargetTooLarge,
    NegativeCurrent,
    CurrentExceedsTarget,
}

impl fmt::Display for GoalValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Goal name cannot be empty"),
            Self::NonPositiveTarget => write!(f, "Target amount must be greater than zero"),
            Self::TargetTooLarge => write!(f, "Target amount cannot exceed {}", Money::MAX_AMOUNT),
            Self::NegativeCurrent => write!(f, "Current amount cannot be negative"),
            Self::CurrentExceedsTarget => write!(f, "Current amount exceeds target amount"),
        }
    }
}

impl std::error::Error for GoalValidationError {}

impl GoalValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyName => "name",
            Self::NonPositiveTarget | Self::TargetTooLarge => "target_amount",
            Self::NegativeCurrent | Self::CurrentExceedsTarget => "current_amount",
        }
    }
}

/// A savings goal funded from surplus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub id: GoalId,
    pub owner_id: OwnerId,
    pub name: String,
    pub target_amount: Money,
    #[serde(default)]
    pub current_amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavingsGoal {
    pub fn new(
        owner_id: OwnerId,
        name: impl Into<String>,
        target_amount: Money,
        deadline: Option<NaiveDate>,
        priority: Priority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: GoalId::new(),
            owner_id,
            name: name.into(),
            target_amount,
            current_amount: Money::zero(),
            deadline,
            priority,
            created_at: now,
            updated_at: now,
        }
    }

    /// The deadline, or [`FAR_FUTURE`] when none is set
    pub fn effective_deadline(&self) -> NaiveDate {
        self.deadline.unwrap_or(FAR_FUTURE)
    }

    /// Funding order: deadline, then priority, then age, then id
    pub fn allocation_order(&self, other: &Self) -> Ordering {
        self.effective_deadline()
            .cmp(&other.effective_deadline())
            .then_with(|| self.priority.rank().cmp(&other.priority.rank()))
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn remaining(&self) -> Money {
        (self.target_amount - self.current_amount).max_zero()
    }

    pub fn is_completed(&self) -> bool {
        self.current_amount >= self.target_amount
    }

    /// Progress toward the target, 0-100
    pub fn progress_percent(&self) -> f64 {
        if !self.target_amount.is_positive() {
            return 0.0;
        }
        let pct = self.current_amount.cents() as f64 / self.target_amount.cents() as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Validate the goal
    pub fn validate(&self) -> Result<(), GoalValidationError> {
        if self.name.trim().is_empty() {
            return Err(GoalValidationError::EmptyName);
        }
        if !self.target_amount.is_positive() {
            return Err(GoalValidationError::NonPositiveTarget);
        }
        if self.target_amount > Money::MAX_AMOUNT {
            return Err(GoalValidationError::TargetTooLarge);
        }
        if self.current_amount.is_negative() {
            return Err(GoalValidationError::NegativeCurrent);
        }
        if self.current_amount > self.target_amount {
            return Err(GoalValidationError::CurrentExceedsTarget);
        }
        Ok(())
    }
}

impl fmt::Display for SavingsGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} / {}",
            self.name, self.current_amount, self.target_amount
        )
    }
}
