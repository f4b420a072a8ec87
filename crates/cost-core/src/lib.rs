#![deny(warnings)]

//! Core domain models and invariants for the plant cost model.
//!
//! This crate defines serializable types used across the cost engine with
//! validation helpers to guarantee basic invariants: every cost field is
//! finite and non-negative, and account identifiers are unique within a
//! ledger.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Well-known scalar configuration and plant characteristic keys.
pub mod keys {
    /// Boolean switch between the fleet-wide and the discrete reallocation path.
    pub const ENABLE_MASS_MANUFACTURING: &str = "Enable Mass Manufacturing";
    /// Fallback factory-assembly fraction when no prefix rule matches.
    pub const DEGREE_OF_FACTORY_ASSEMBLY: &str = "Degree of Factory Assembly";
    /// One-time factory setup cost, amortized over the production volume.
    pub const FACTORY_SETUP_COST: &str = "Factory Setup Cost";
    /// Divisor applied to labor cost moved into the factory.
    pub const MASS_MFG_EFFICIENCY: &str = "Mass Mfg Efficiency";
    /// Units the factory setup cost is spread over; defaults to the order count.
    pub const PRODUCTION_VOLUME: &str = "Production Volume";
    /// Multiplier on module factory costs (discrete path, required).
    pub const FACTORY_COST_MULT: &str = "Factory cost mult";
    /// Multiplier on per-module offsite work fractions (discrete path, required).
    pub const OFFSITE_WORK_MULT: &str = "Offsite work mult";
    /// Multiplier on per-module offsite efficiency (discrete path, required).
    pub const OFFSITE_EFFICIENCY_MULT: &str = "Offsite efficiency mult";
    /// Plant characteristic holding `PREFIX:FRACTION,...` overrides.
    pub const FACTORY_FRACTIONS: &str = "Factory Fractions";
}

/// Hierarchical account code identifying one ledger line item, e.g. "A.21.01".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Borrow the raw code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reporting category: the first four characters of the code, e.g. "A.21".
    /// Codes shorter than four characters are their own category.
    pub fn category(&self) -> &str {
        self.0.get(..4).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cost and labor quantities carried by one account.
///
/// All fields are in caller-fixed units (currency for costs, hours for labor)
/// and must be finite and non-negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    /// Equipment cost incurred at the factory.
    pub factory_equipment_cost: f64,
    /// Material cost incurred on site.
    pub site_material_cost: f64,
    /// Labor cost incurred on site.
    pub site_labor_cost: f64,
    /// Labor hours expended on site.
    pub site_labor_hours: f64,
}

/// One ledger row: an account and its cost quantities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Account identifier, unique within a ledger.
    pub account: AccountId,
    /// Cost quantities for this account.
    pub costs: CostRecord,
}

/// Insertion-ordered cost table for one plant order.
///
/// Row order is preserved by every transform; the first row is the sink for
/// one-time setup cost in mass-manufacturing mode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostLedger {
    /// Rows in insertion order.
    pub entries: Vec<LedgerEntry>,
}

impl CostLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row, preserving insertion order. Uniqueness is checked by
    /// [`validate_ledger`], not here.
    pub fn push(&mut self, account: AccountId, costs: CostRecord) {
        self.entries.push(LedgerEntry { account, costs });
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the ledger has no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row for an exact account code, if present.
    pub fn get(&self, account: &str) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.account.as_str() == account)
    }

    /// Account codes in row order.
    pub fn account_ids(&self) -> impl Iterator<Item = &AccountId> {
        self.entries.iter().map(|e| &e.account)
    }

    /// Sum of factory equipment cost over all rows.
    pub fn total_factory_cost(&self) -> f64 {
        self.entries.iter().map(|e| e.costs.factory_equipment_cost).sum()
    }

    /// Sum of site material and labor cost over all rows.
    pub fn total_site_cost(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.costs.site_material_cost + e.costs.site_labor_cost)
            .sum()
    }

    /// Sum of site labor hours over all rows.
    pub fn total_site_hours(&self) -> f64 {
        self.entries.iter().map(|e| e.costs.site_labor_hours).sum()
    }
}

/// A scalar configuration value: numeric or boolean.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// Boolean flag, e.g. "Enable Mass Manufacturing".
    Flag(bool),
    /// Numeric value, e.g. multipliers and costs.
    Number(f64),
}

/// Flat key/value configuration mapping, typically sourced from one
/// spreadsheet row or a JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScalarConfig {
    values: BTreeMap<String, ScalarValue>,
}

impl ScalarConfig {
    /// Empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a numeric value.
    pub fn set_number(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), ScalarValue::Number(value));
    }

    /// Set a boolean flag.
    pub fn set_flag(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), ScalarValue::Flag(value));
    }

    /// Raw value for a key.
    pub fn get(&self, key: &str) -> Option<ScalarValue> {
        self.values.get(key).copied()
    }

    /// Numeric value for a key, or `None` when absent or boolean.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(ScalarValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value for a key, falling back to `default`.
    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    /// Boolean value for a key, falling back to `default`. Spreadsheet-sourced
    /// configurations encode flags as 0/1, so nonzero numbers read as `true`.
    pub fn flag_or(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(ScalarValue::Flag(b)) => *b,
            Some(ScalarValue::Number(n)) => *n != 0.0,
            None => default,
        }
    }

    /// Iterate keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutable iteration for collaborators that perturb values in bulk.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ScalarValue)> {
        self.values.iter_mut().map(|(k, v)| (k.as_str(), v))
    }
}

/// Optional free-form plant traits, e.g. the "Factory Fractions" override
/// string consumed by the fraction resolver.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlantCharacteristics {
    values: BTreeMap<String, String>,
}

impl PlantCharacteristics {
    /// Empty characteristics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a trait value.
    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Trait value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// The raw `PREFIX:FRACTION,...` override string, if present.
    pub fn factory_fractions(&self) -> Option<&str> {
        self.get(keys::FACTORY_FRACTIONS)
    }
}

/// Per-row flags marking which ledger accounts a reallocation touched.
///
/// Index-aligned with the ledger's row order; the marked set is always a
/// subset of the ledger's accounts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModularizationMask {
    flags: Vec<bool>,
}

impl ModularizationMask {
    /// Mask with every row unmarked.
    pub fn empty(len: usize) -> Self {
        Self { flags: vec![false; len] }
    }

    /// Mask with every row marked.
    pub fn complete(len: usize) -> Self {
        Self { flags: vec![true; len] }
    }

    /// Mark one row as modularized.
    pub fn mark(&mut self, index: usize) {
        if let Some(flag) = self.flags.get_mut(index) {
            *flag = true;
        }
    }

    /// Whether a row was modularized.
    pub fn is_marked(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    /// Number of rows covered by the mask.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// True when the mask covers no rows.
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Number of modularized rows.
    pub fn count_marked(&self) -> usize {
        self.flags.iter().filter(|f| **f).count()
    }

    /// Per-row flags in ledger order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.flags.iter().copied()
    }

    /// Account codes of the modularized rows, in ledger order.
    pub fn marked_accounts<'a>(&self, ledger: &'a CostLedger) -> Vec<&'a AccountId> {
        ledger
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_marked(*i))
            .map(|(_, e)| &e.account)
            .collect()
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Cost fields must be finite.
    #[error("non-finite cost value in account {0}")]
    NonFinite(String),
    /// Cost and hour fields must be non-negative.
    #[error("negative cost value in account {0}")]
    NegativeCost(String),
    /// Account codes must be non-empty.
    #[error("empty account identifier")]
    EmptyAccountId,
    /// Account codes must be unique within a ledger.
    #[error("duplicate account identifier: {0}")]
    DuplicateAccount(String),
}

/// Validate a single cost record against the field invariants.
pub fn validate_record(account: &AccountId, record: &CostRecord) -> Result<(), ValidationError> {
    let fields = [
        record.factory_equipment_cost,
        record.site_material_cost,
        record.site_labor_cost,
        record.site_labor_hours,
    ];
    if fields.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite(account.0.clone()));
    }
    if fields.iter().any(|v| *v < 0.0) {
        return Err(ValidationError::NegativeCost(account.0.clone()));
    }
    Ok(())
}

/// Validate a full ledger: per-row invariants plus account uniqueness.
pub fn validate_ledger(ledger: &CostLedger) -> Result<(), ValidationError> {
    let mut seen = std::collections::BTreeSet::new();
    for entry in &ledger.entries {
        if entry.account.0.trim().is_empty() {
            return Err(ValidationError::EmptyAccountId);
        }
        validate_record(&entry.account, &entry.costs)?;
        if !seen.insert(&entry.account) {
            return Err(ValidationError::DuplicateAccount(entry.account.0.clone()));
        }
    }
    Ok(())
}
