//! Percentage budget model
//!
//! A budget reserves a share of the income available in its date window and
//! splits that share across expense categories. Percents are stored in basis
//! points (1/100 of a percent), so 12.5% is 1250.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{BudgetId, OwnerId};
use super::money::Money;
use super::window::DateWindow;

/// 100% in basis points
pub const FULL_PERCENT_BP: u32 = 10_000;

/// Format basis points as a percentage string such as `12.50%`
pub fn format_percent(bp: u32) -> String {
    format!("{}.{:02}%", bp / 100, bp % 100)
}

/// One category's share of a budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCategory {
    pub category: String,
    /// Share of the budget total, in basis points
    pub percent_bp: u32,
}

impl BudgetCategory {
    pub fn new(category: impl Into<String>, percent_bp: u32) -> Self {
        Self {
            category: category.into(),
            percent_bp,
        }
    }

    /// Spending limit given the budget's total amount
    pub fn limit(&self, budget_total: Money) -> Money {
        budget_total.percent_bp(self.percent_bp)
    }
}

/// Validation errors for budgets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetValidationError {
    EmptyName,
    PercentOutOfRange(String),
    EndBeforeStart,
    DuplicateCategory(String),
    EmptyCategory,
    /// Category shares add up to more than the whole budget
    CategoriesOverAllocated(u32),
}

impl fmt::Display for BudgetValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Budget name cannot be empty"),
            Self::PercentOutOfRange(what) => {
                write!(f, "Percent for {} must be between 0% and 100%", what)
            }
            Self::EndBeforeStart => write!(f, "End date cannot be before start date"),
            Self::DuplicateCategory(name) => {
                write!(f, "Category '{}' appears more than once", name)
            }
            Self::EmptyCategory => write!(f, "Category name cannot be empty"),
            Self::CategoriesOverAllocated(bp) => write!(
                f,
                "Total category percentages ({}) cannot exceed 100% of the budget",
                format_percent(*bp)
            ),
        }
    }
}

impl std::error::Error for BudgetValidationError {}

impl BudgetValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyName => "name",
            Self::PercentOutOfRange(_) => "percent",
            Self::EndBeforeStart => "end_date",
            Self::DuplicateCategory(_) | Self::EmptyCategory => "category",
            Self::CategoriesOverAllocated(_) => "categories",
        }
    }
}

/// A percentage budget over a date window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub owner_id: OwnerId,
    pub name: String,
    /// Share of available income, in basis points
    pub total_percent_bp: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub categories: Vec<BudgetCategory>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(
        owner_id: OwnerId,
        name: impl Into<String>,
        total_percent_bp: u32,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BudgetId::new(),
            owner_id,
            name: name.into(),
            total_percent_bp,
            start_date,
            end_date,
            categories: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn window(&self) -> DateWindow {
        DateWindow::between(self.start_date, self.end_date)
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.window().contains(date)
    }

    pub fn category(&self, name: &str) -> Option<&BudgetCategory> {
        self.categories.iter().find(|c| c.category == name)
    }

    /// Budget total given the income available in its window
    pub fn total_amount(&self, available_income: Money) -> Money {
        available_income.percent_bp(self.total_percent_bp)
    }

    /// Validate the budget
    pub fn validate(&self) -> Result<(), BudgetValidationError> {
        if self.name.trim().is_empty() {
            return Err(BudgetValidationError::EmptyName);
        }
        if self.total_percent_bp > FULL_PERCENT_BP {
            return Err(BudgetValidationError::PercentOutOfRange("budget".into()));
        }
        if self.end_date < self.start_date {
            return Err(BudgetValidationError::EndBeforeStart);
        }
        for (i, cat) in self.categories.iter().enumerate() {
            if cat.category.trim().is_empty() {
                return Err(BudgetValidationError::EmptyCategory);
            }
            if cat.percent_bp > FULL_PERCENT_BP {
                return Err(BudgetValidationError::PercentOutOfRange(cat.category.clone()));
            }
            if self.categories[..i]
                .iter()
                .any(|other| other.category == cat.category)
            {
                return Err(BudgetValidationError::DuplicateCategory(cat.category.clone()));
            }
        }
        let allocated: u32 = self.categories.iter().map(|c| c.percent_bp).sum();
        if allocated > FULL_PERCENT_BP {
            return Err(BudgetValidationError::CategoriesOverAllocated(allocated));
        }
        Ok(())
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} to {}, {})",
            self.name,
            self.start_date,
            self.end_date,
            format_percent(self.total_percent_bp)
        )
    }
}
