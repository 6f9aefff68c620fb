//! Income/expense distinction
//!
//! Every ledger record is either money coming in or money going out. The
//! variants carry the label that only makes sense for their side.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the ledger a record sits on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Kind {
    /// Money received, labelled by where it came from
    Income { source: String },
    /// Money spent, labelled by what it was for
    Expense { name: String },
}

/// Fieldless form of [`Kind`] for filters and aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    Income,
    Expense,
}

impl Kind {
    pub fn income(source: impl Into<String>) -> Self {
        Self::Income {
            source: source.into(),
        }
    }

    pub fn expense(name: impl Into<String>) -> Self {
        Self::Expense { name: name.into() }
    }

    pub fn tag(&self) -> KindTag {
        match self {
            Self::Income { .. } => KindTag::Income,
            Self::Expense { .. } => KindTag::Expense,
        }
    }

    pub fn is_income(&self) -> bool {
        matches!(self, Self::Income { .. })
    }

    pub fn is_expense(&self) -> bool {
        matches!(self, Self::Expense { .. })
    }

    /// The source (income) or name (expense)
    pub fn label(&self) -> &str {
        match self {
            Self::Income { source } => source,
            Self::Expense { name } => name,
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "Income"),
            Self::Expense => write!(f, "Expense"),
        }
    }
}
