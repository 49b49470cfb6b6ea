// crates/monitord-core/src/facts.rs
// ============================================================================
// Module: Fact Model
// Description: Typed, namespaced observations flowing from probes to rules.
// Purpose: Represent heterogeneous collected values and the single numeric
//          coercion helper every rule consults.
// Dependencies: serde, serde_json
// ============================================================================

//! Facts are the unit of data a [`crate::traits::Probe`] produces and a
//! [`crate::traits::Rule`] consumes. Keys are hierarchical and namespaced by
//! the originating platform (`evm.block`, `http.status`,
//! `pendle.impliedApy`); [`validate_fact_key`] only ever warns, it never
//! fails collection.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A single observed value. Facts may be absent (`Null`) without being an
/// error; probes use `Null` to record a datum they could not collect this
/// run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    /// No value was available this run.
    Null,
    /// A boolean observation.
    Bool(bool),
    /// A signed integer observation.
    Int(i64),
    /// A floating point observation.
    Float(f64),
    /// An arbitrary-precision integer observation, carried as its decimal
    /// string form (e.g. a 256-bit EVM balance that overflows `i64`).
    BigInt(String),
    /// A string observation.
    String(String),
}

impl FactValue {
    /// Coerces this value into `f64` for numeric rule evaluation.
    ///
    /// Returns `None` when the value is absent or not numerically
    /// meaningful (booleans and arbitrary strings do not coerce); a rule
    /// that cannot coerce evaluates to no alert rather than erroring.
    #[must_use]
    pub fn coerce_numeric(&self) -> Option<f64> {
        match self {
            Self::Null | Self::Bool(_) => None,
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::BigInt(raw) => raw.parse::<f64>().ok(),
            Self::String(raw) => raw.trim().parse::<f64>().ok(),
        }
    }

    /// Renders the value for template substitution and display.
    #[must_use]
    pub fn display_string(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::BigInt(raw) | Self::String(raw) => raw.clone(),
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

/// Mapping from dotted, namespaced key to observed value.
pub type Facts = BTreeMap<String, FactValue>;

/// Emits a warning string for a key that violates the `<namespace>.<rest>`
/// shape. Returns `None` for well-formed keys; collection never fails on a
/// malformed key, it is only ever logged by the caller.
#[must_use]
pub fn validate_fact_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("fact key is empty".to_string());
    }
    match key.split_once('.') {
        Some((namespace, rest)) if !namespace.is_empty() && !rest.is_empty() => None,
        _ => Some(format!("fact key '{key}' does not follow '<namespace>.<rest>'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_numeric_handles_every_numeric_shaped_variant() {
        assert_eq!(FactValue::Int(42).coerce_numeric(), Some(42.0));
        assert_eq!(FactValue::Float(1.5).coerce_numeric(), Some(1.5));
        assert_eq!(FactValue::BigInt("123456789012345".to_string()).coerce_numeric(), Some(123_456_789_012_345.0));
        assert_eq!(FactValue::String(" 7 ".to_string()).coerce_numeric(), Some(7.0));
    }

    #[test]
    fn coerce_numeric_rejects_non_numeric_values() {
        assert_eq!(FactValue::Null.coerce_numeric(), None);
        assert_eq!(FactValue::Bool(true).coerce_numeric(), None);
        assert_eq!(FactValue::String("abc".to_string()).coerce_numeric(), None);
    }

    #[test]
    fn validate_fact_key_accepts_namespaced_keys() {
        assert_eq!(validate_fact_key("evm.block"), None);
        assert_eq!(validate_fact_key("pendle.impliedApy"), None);
    }

    #[test]
    fn validate_fact_key_warns_on_malformed_keys() {
        assert!(validate_fact_key("").is_some());
        assert!(validate_fact_key("noNamespace").is_some());
        assert!(validate_fact_key("evm.").is_some());
        assert!(validate_fact_key(".block").is_some());
    }
}
