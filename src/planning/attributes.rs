//! Attribute store: everything learned about the user so far.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Well-known attribute keys used by the standard catalog.
pub mod keys {
    pub const MONTHLY_INCOME: &str = "monthly_income";
    pub const FIXED_EXPENSES: &str = "fixed_expenses";
    pub const HAS_DEBT: &str = "has_debt";
    pub const DEBT_PAYMENT: &str = "debt_payment";
    pub const SAVINGS_GOAL: &str = "savings_goal";
    pub const RISK_TOLERANCE: &str = "risk_tolerance";
}

/// Stored form of a yes/no answer.
pub const YES: &str = "yes";
pub const NO: &str = "no";

/// A set of attribute updates produced by a single answer.
pub type AttributeUpdates = BTreeMap<String, String>;

/// Mapping from attribute key to string value.
///
/// Keys are kept ordered so that snapshots, exports and rendered listings are
/// identical across runs. Empty values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct AttributeStore {
    values: BTreeMap<String, String>,
}

impl AttributeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a persisted mapping. Blank values are treated as absent.
    pub fn from_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut store = Self::new();
        for (key, value) in entries {
            store.set(key, value);
        }
        store
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether `key` is known.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Snapshot of the current mapping.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }

    /// Set a single attribute. Returns `true` if the key was not known before.
    ///
    /// Blank values are ignored so a known key is never cleared by accident.
    fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into().trim().to_string();
        if value.is_empty() {
            tracing::debug!(key = %key, "Ignoring blank attribute value");
            return false;
        }
        self.values.insert(key, value).is_none()
    }

    /// Merge answer updates, last write wins. Returns how many keys were added.
    pub fn merge(&mut self, updates: AttributeUpdates) -> usize {
        let mut added = 0;
        for (key, value) in updates {
            if self.set(key, value) {
                added += 1;
            }
        }
        added
    }

    /// Read a monetary attribute.
    ///
    /// `None` if absent, `Some(Err(raw))` if present but not a number.
    pub fn decimal(&self, key: &str) -> Option<Result<Decimal, String>> {
        let raw = self.get(key)?;
        Some(Decimal::from_str(raw).map_err(|_| raw.to_string()))
    }

    /// Read a yes/no attribute. Any value other than `yes` or `no` is `None`.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            YES => Some(true),
            NO => Some(false),
            _ => None,
        }
    }

    /// Human-readable listing used when a session resumes.
    pub fn describe(&self) -> String {
        let mut out = String::from("Here's what I know about you:\n");
        for (key, value) in self.iter() {
            out.push_str(&format!("{key} : {value}\n"));
        }
        out
    }
}

impl From<BTreeMap<String, String>> for AttributeStore {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::from_map(map)
    }
}

impl From<AttributeStore> for BTreeMap<String, String> {
    fn from(store: AttributeStore) -> Self {
        store.values
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeStore {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_map(iter)
    }
}
