//! Budget recommendation and the exported budget built from it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::money;

/// Immutable output of the allocation formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Category name → recommended monthly amount (never negative).
    allocations: BTreeMap<String, Decimal>,
    /// Human-readable explanation.
    summary: String,
}

impl Recommendation {
    pub fn new(allocations: BTreeMap<String, Decimal>, summary: impl Into<String>) -> Self {
        Self {
            allocations,
            summary: summary.into(),
        }
    }

    pub fn allocations(&self) -> &BTreeMap<String, Decimal> {
        &self.allocations
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Sum of every allocation, saturating at `Decimal::MAX`.
    pub fn total(&self) -> Decimal {
        self.allocations
            .values()
            .fold(Decimal::ZERO, |acc, amount| acc.saturating_add(*amount))
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (category, amount) in &self.allocations {
            writeln!(f, "{category}: {}", money(*amount))?;
        }
        write!(f, "\n{}", self.summary)
    }
}

/// A monthly budget exported from a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Total monthly budget (sum of the categories).
    pub monthly_budget: Decimal,
    /// Per-category limits.
    pub categories: BTreeMap<String, Decimal>,
    /// When the budget was exported.
    pub exported_at: DateTime<Utc>,
}

impl Budget {
    /// Build a budget from a recommendation, stamped with the current time.
    pub fn from_recommendation(recommendation: &Recommendation) -> Self {
        Self {
            monthly_budget: recommendation.total(),
            categories: recommendation.allocations().clone(),
            exported_at: Utc::now(),
        }
    }
}
