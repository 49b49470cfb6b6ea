// crates/monitord-core/src/descriptor.rs
// ============================================================================
// Module: Static Descriptors
// Description: Configuration-shaped descriptors for platforms, probes, and
//              rules.
// Purpose: Define the validated-record shape the engine assumes its caller
//          supplies (configuration parsing itself is an external
//          collaborator's responsibility).
// Dependencies: serde, serde_json, crate::identifiers
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::PlatformId;
use crate::identifiers::ProbeId;
use crate::identifiers::RuleId;

/// Default per-probe collection deadline, in milliseconds, when a
/// [`ProbeDescriptor`] does not specify one.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Static capabilities advertised by a registered platform plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Unique platform identifier.
    pub id: PlatformId,
    /// Human-facing display name.
    pub display_name: String,
    /// Platform implementation version.
    pub version: String,
    /// Probe types this platform knows how to mint.
    pub supported_probe_types: BTreeSet<String>,
}

/// Comparison operator for a [`RuleKind::Threshold`] rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Greater than.
    #[serde(rename = ">")]
    GreaterThan,
    /// Greater than or equal to.
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    /// Less than.
    #[serde(rename = "<")]
    LessThan,
    /// Less than or equal to.
    #[serde(rename = "<=")]
    LessThanOrEqual,
}

impl Operator {
    /// Evaluates `lhs OP rhs`.
    #[must_use]
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::GreaterThan => lhs > rhs,
            Self::GreaterThanOrEqual => lhs >= rhs,
            Self::LessThan => lhs < rhs,
            Self::LessThanOrEqual => lhs <= rhs,
        }
    }
}

/// Alert severity accepted in descriptors before conversion to
/// [`crate::alert::Severity`]; kept separate so descriptor deserialization
/// does not have to special-case the engine's internal severity type.
pub type DescriptorSeverity = crate::alert::Severity;

/// The closed set of rule kinds the engine can evaluate. Adding a kind is a
/// first-class change to `RuleFactory`, not a configuration-only change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Numeric threshold crossing with hysteresis.
    Threshold {
        /// Comparison operator.
        operator: Operator,
        /// Threshold value compared against the coerced fact.
        threshold: f64,
    },
    /// Value-change detection, alerting on every distinct transition after
    /// the first observation.
    Change,
}

/// Configured rule, resolved against a fact key within its owning probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    /// Rule identifier, unique within its probe.
    pub id: RuleId,
    /// Rule kind and kind-specific fields.
    #[serde(flatten)]
    pub kind: RuleKind,
    /// Dotted fact key this rule observes.
    pub fact: String,
    /// Severity assigned to emitted alerts; kind-specific default applies
    /// when omitted (`warning` for threshold, `info` for change).
    #[serde(default)]
    pub severity: Option<DescriptorSeverity>,
    /// Alert title; kind-specific default applies when omitted.
    #[serde(default)]
    pub title: Option<String>,
    /// Alert message template; kind-specific default applies when omitted.
    #[serde(default)]
    pub message_template: Option<String>,
}

/// Configured probe: which platform and probe type to instantiate, its
/// schedule, and the rules evaluated against its facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeDescriptor {
    /// Unique probe identifier.
    pub id: ProbeId,
    /// Platform that mints this probe.
    pub platform: PlatformId,
    /// Probe type, validated against the platform's `supported_probe_types`.
    #[serde(rename = "type")]
    pub probe_type: String,
    /// Whether the scheduler arms a timer for this probe.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Collection interval, in seconds.
    pub interval: u64,
    /// Per-run collection deadline, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    /// Platform-specific configuration bag.
    #[serde(default)]
    pub config: Value,
    /// Rules evaluated against this probe's facts, in configured order.
    #[serde(default)]
    pub rules: Vec<RuleDescriptor>,
}

const fn default_enabled() -> bool {
    true
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_apply_matches_each_variant() {
        assert!(Operator::GreaterThan.apply(20.0, 15.0));
        assert!(!Operator::GreaterThan.apply(15.0, 15.0));
        assert!(Operator::GreaterThanOrEqual.apply(15.0, 15.0));
        assert!(Operator::LessThan.apply(10.0, 15.0));
        assert!(Operator::LessThanOrEqual.apply(15.0, 15.0));
    }

    #[test]
    fn probe_descriptor_deserializes_with_defaults() {
        let json = serde_json::json!({
            "id": "p1",
            "platform": "httppoll",
            "type": "json_poll",
            "interval": 60,
            "config": {"url": "https://example.invalid/status"},
        });
        let descriptor: ProbeDescriptor = serde_json::from_value(json).expect("deserializes");
        assert!(descriptor.enabled);
        assert_eq!(descriptor.timeout, DEFAULT_TIMEOUT_MS);
        assert!(descriptor.rules.is_empty());
    }
}
