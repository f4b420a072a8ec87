//! Factory-assembly fraction policy.
//!
//! The effective policy is an ordered prefix table: built-in defaults first,
//! in declaration order, optionally extended or overridden per plant through
//! the `"Factory Fractions"` characteristic string. Resolution scans the
//! table in order and the first prefix matching an account code wins, so
//! earlier entries shadow later, more specific ones.

use cost_core::PlantCharacteristics;
use thiserror::Error;
use tracing::{debug, warn};

/// Built-in factory-assembly fractions for the standard cost areas.
///
/// Passed into [`resolve_factory_fractions`] explicitly so tests can inject
/// their own table. Structures ship least readily; reactor and turbine
/// equipment most.
pub const DEFAULT_FACTORY_FRACTIONS: [(&str, f64); 6] = [
    ("A.21", 0.35),
    ("A.22", 0.90),
    ("A.23", 0.85),
    ("A.24", 0.80),
    ("A.25", 0.75),
    ("A.26", 0.55),
];

/// Ordered mapping from account-code prefix to a fraction in [0, 1].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FactoryFractionMap {
    entries: Vec<(String, f64)>,
}

impl FactoryFractionMap {
    /// Build a map from a default table, preserving its order.
    pub fn from_defaults(defaults: &[(&str, f64)]) -> Self {
        Self {
            entries: defaults.iter().map(|(p, f)| (p.to_string(), *f)).collect(),
        }
    }

    /// Set a prefix's fraction: an existing prefix is updated in place, a new
    /// one is appended after all current entries.
    pub fn set(&mut self, prefix: &str, fraction: f64) {
        match self.entries.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, f)) => *f = fraction,
            None => self.entries.push((prefix.to_string(), fraction)),
        }
    }

    /// Fraction for an account code: the first prefix in table order that the
    /// code starts with wins. `None` when no prefix matches.
    pub fn resolve(&self, account: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(prefix, _)| account.starts_with(prefix.as_str()))
            .map(|(_, fraction)| *fraction)
    }

    /// Entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(p, f)| (p.as_str(), *f))
    }

    /// Number of prefix rules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the map holds no rules.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors from parsing a `"PREFIX:FRACTION,..."` override string.
#[derive(Debug, Error, PartialEq)]
pub enum FractionParseError {
    /// Segment is not a `prefix:fraction` pair or the prefix is blank.
    #[error("malformed fraction pair {0:?}")]
    MalformedPair(String),
    /// Fraction must be a finite number within [0, 1].
    #[error("fraction {value:?} for prefix {prefix:?} is not in [0, 1]")]
    OutOfRange {
        /// Prefix the bad fraction was bound to.
        prefix: String,
        /// Raw fraction text.
        value: String,
    },
}

/// Parse an override string into ordered `(prefix, fraction)` pairs.
///
/// Whitespace around prefixes and fractions is trimmed; empty segments from
/// stray commas are skipped. Any malformed segment fails the whole parse so
/// callers never apply a partial override set.
pub fn parse_fraction_overrides(raw: &str) -> Result<Vec<(String, f64)>, FractionParseError> {
    let mut pairs = Vec::new();
    for segment in raw.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((prefix, fraction)) = segment.split_once(':') else {
            return Err(FractionParseError::MalformedPair(segment.to_string()));
        };
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(FractionParseError::MalformedPair(segment.to_string()));
        }
        let value = fraction.trim();
        match value.parse::<f64>() {
            Ok(f) if f.is_finite() && (0.0..=1.0).contains(&f) => {
                pairs.push((prefix.to_string(), f));
            }
            _ => {
                return Err(FractionParseError::OutOfRange {
                    prefix: prefix.to_string(),
                    value: value.to_string(),
                })
            }
        }
    }
    Ok(pairs)
}

/// Build the effective fraction policy for one plant.
///
/// Starts from `defaults` and merges any `"Factory Fractions"` overrides from
/// the characteristics. A malformed override string is a recovered error: it
/// is logged and the defaults are kept unmodified.
pub fn resolve_factory_fractions(
    defaults: &[(&str, f64)],
    characteristics: Option<&PlantCharacteristics>,
) -> FactoryFractionMap {
    let mut map = FactoryFractionMap::from_defaults(defaults);
    let Some(raw) = characteristics.and_then(|c| c.factory_fractions()) else {
        return map;
    };
    if raw.trim().is_empty() {
        return map;
    }
    match parse_fraction_overrides(raw) {
        Ok(pairs) => {
            for (prefix, fraction) in pairs {
                debug!(prefix = %prefix, fraction, "factory fraction override");
                map.set(&prefix, fraction);
            }
        }
        Err(err) => {
            warn!(%err, overrides = raw, "malformed factory fraction overrides, keeping defaults");
        }
    }
    map
}
