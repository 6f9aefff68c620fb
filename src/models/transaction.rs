//! Transaction model
//!
//! A materialized income or expense. Transactions created by the scheduler
//! carry the id of the recurring rule they came from.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{OwnerId, RuleId, TransactionId};
use super::kind::{Kind, KindTag};
use super::money::Money;
use super::recurring::RecurringRule;

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    NonPositiveAmount,
    AmountTooLarge,
    EmptyLabel,
    EmptyCategory,
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveAmount => write!(f, "Amount must be greater than zero"),
            Self::AmountTooLarge => write!(f, "Amount cannot exceed {}", Money::MAX_AMOUNT),
            Self::EmptyLabel => write!(f, "Source or name cannot be empty"),
            Self::EmptyCategory => write!(f, "Category cannot be empty"),
        }
    }
}

impl std::error::Error for TransactionValidationError {}

impl TransactionValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::NonPositiveAmount | Self::AmountTooLarge => "amount",
            Self::EmptyLabel => "label",
            Self::EmptyCategory => "category",
        }
    }
}

/// Uniqueness key for scheduler-created transactions
///
/// No two transactions may share an owner, provenance rule, date, amount and
/// category. Direct user entries have no provenance and no key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub owner_id: OwnerId,
    pub rule_id: RuleId,
    pub date: NaiveDate,
    pub amount: Money,
    pub category: String,
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.rule_id, self.date, self.amount, self.category
        )
    }
}

/// A concrete income or expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub kind: Kind,
    pub amount: Money,
    pub date: NaiveDate,
    pub category: String,
    /// The recurring rule this transaction was materialized from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a direct user entry
    pub fn new(
        owner_id: OwnerId,
        kind: Kind,
        amount: Money,
        date: NaiveDate,
        category: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            owner_id,
            kind,
            amount,
            date,
            category: category.into(),
            rule_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Materialize the rule's current period
    pub fn from_rule(rule: &RecurringRule) -> Self {
        let mut txn = Self::new(
            rule.owner_id,
            rule.kind.clone(),
            rule.amount,
            rule.next_due_date,
            rule.category.clone(),
        );
        txn.rule_id = Some(rule.id);
        txn
    }

    pub fn tag(&self) -> KindTag {
        self.kind.tag()
    }

    pub fn is_income(&self) -> bool {
        self.kind.is_income()
    }

    pub fn is_expense(&self) -> bool {
        self.kind.is_expense()
    }

    /// The uniqueness key, if this transaction came from a rule
    pub fn idempotency_key(&self) -> Option<IdempotencyKey> {
        self.rule_id.map(|rule_id| IdempotencyKey {
            owner_id: self.owner_id,
            rule_id,
            date: self.date,
            amount: self.amount,
            category: self.category.clone(),
        })
    }

    /// Amount signed by direction: positive for income, negative for expense
    pub fn signed_amount(&self) -> Money {
        if self.is_income() {
            self.amount
        } else {
            -self.amount
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Validate the transaction
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if !self.amount.is_positive() {
            return Err(TransactionValidationError::NonPositiveAmount);
        }
        if self.amount > Money::MAX_AMOUNT {
            return Err(TransactionValidationError::AmountTooLarge);
        }
        if self.kind.label().trim().is_empty() {
            return Err(TransactionValidationError::EmptyLabel);
        }
        if self.category.trim().is_empty() {
            return Err(TransactionValidationError::EmptyCategory);
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({})",
            self.date,
            self.kind.label(),
            self.amount,
            self.category
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Frequency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_direct_entry_has_no_key() {
        let txn = Transaction::new(
            OwnerId::new(),
            Kind::expense("Groceries"),
            Money::from_units(80),
            date(2024, 5, 2),
            "Food & Dining",
        );
        assert!(txn.idempotency_key().is_none());
        assert_eq!(txn.signed_amount().cents(), -8000);
    }

    #[test]
    fn test_from_rule_carries_provenance() {
        let rule = RecurringRule::new(
            OwnerId::new(),
            Kind::income("Employer"),
            Money::from_units(3000),
            "Salary",
            Frequency::Monthly,
            date(2024, 1, 31),
            None,
        );
        let txn = Transaction::from_rule(&rule);
        let key = txn.idempotency_key().unwrap();
        assert_eq!(key.rule_id, rule.id);
        assert_eq!(key.date, date(2024, 1, 31));
        assert_eq!(key.amount, rule.amount);
        assert!(txn.is_income());
    }

    #[test]
    fn test_validation() {
        let mut txn = Transaction::new(
            OwnerId::new(),
            Kind::income(""),
            Money::from_units(10),
            date(2024, 5, 2),
            "Salary",
        );
        assert_eq!(txn.validate(), Err(TransactionValidationError::EmptyLabel));

        txn.kind = Kind::income("Employer");
        txn.amount = Money::from_cents(-1);
        assert_eq!(
            txn.validate(),
            Err(TransactionValidationError::NonPositiveAmount)
        );
    }

    #[test]
    fn test_serialization() {
        let txn = Transaction::new(
            OwnerId::new(),
            Kind::expense("Bus pass"),
            Money::from_units(45),
            date(2024, 5, 2),
            "Transportation",
        );
        let json = serde_json::to_string(&txn).unwrap();
        assert!(json.contains(r#""kind":"expense""#));
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(txn, deserialized);
    }
}
