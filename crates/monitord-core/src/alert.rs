// crates/monitord-core/src/alert.rs
// ============================================================================
// Module: Alert Model
// Description: The structured notification unit flowing from rules to channels.
// Purpose: Define `Alert`, its severity, and the deterministic id derivation
//          every rule kind relies on.
// Dependencies: sha2, serde
// ============================================================================

//! An [`Alert`] is transient until the pipeline records it. Two evaluations
//! that represent the same logical event must produce identical `id`s so
//! dedup and cooldown can key on it; see [`breach_id`] and [`change_id`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::identifiers::ProbeId;
use crate::identifiers::RuleId;
use crate::time::MillisSinceEpoch;

/// Alert severity, in rising order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; no action implied.
    Info,
    /// Action may be warranted.
    Warning,
    /// Action is warranted.
    Critical,
}

/// A single `(label, url)` pair rendered alongside an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Human-facing label for the link.
    pub label: String,
    /// Target URL.
    pub url: String,
}

/// A structured notification produced by rule evaluation.
///
/// # Invariants
/// - `id` is deterministic for a given `(probe_id, rule_id, stable_key)`;
///   see [`breach_id`] and [`change_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Stable identifier derived from `(probe_id, rule_id, stable_key)`.
    pub id: String,
    /// Identifier of the probe that produced this alert.
    pub probe_id: ProbeId,
    /// Identifier of the rule that produced this alert.
    pub rule_id: RuleId,
    /// Alert severity.
    pub severity: Severity,
    /// Short human title.
    pub title: String,
    /// Human message, already rendered (placeholders substituted).
    pub message: String,
    /// Milliseconds since Unix epoch, captured at rule evaluation.
    pub timestamp: MillisSinceEpoch,
    /// Optional structured entities for display.
    pub entities: BTreeMap<String, String>,
    /// Optional ordered links.
    pub links: Vec<Link>,
}

/// Derives the stable alert id for a threshold-rule breach:
/// `"{probe_id}:{rule_id}:breach"`.
#[must_use]
pub fn breach_id(probe_id: &ProbeId, rule_id: &RuleId) -> String {
    format!("{probe_id}:{rule_id}:breach")
}

/// Derives the stable alert id for a change-rule transition:
/// `"{probe_id}:{rule_id}:{hash8(\"old->new\")}"`.
#[must_use]
pub fn change_id(probe_id: &ProbeId, rule_id: &RuleId, old: &str, new: &str) -> String {
    format!("{probe_id}:{rule_id}:{}", hash8(&format!("{old}->{new}")))
}

/// Derives a system alert id for a watchdog-detected stuck run:
/// `"{probe_id}:system:stuck"`.
#[must_use]
pub fn stuck_id(probe_id: &ProbeId) -> String {
    format!("{probe_id}:system:stuck")
}

/// Returns the first 8 hex characters of the SHA-256 digest of `input`.
#[must_use]
pub fn hash8(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let full = hex_encode(&digest);
    full[..8].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Substitutes `${value}`/`${threshold}`/`${old}`/`${new}` placeholders in a
/// message template. Missing placeholders in `substitutions` are left
/// untouched in the output.
#[must_use]
pub fn render_template(template: &str, substitutions: &BTreeMap<&str, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in substitutions {
        rendered = rendered.replace(&format!("${{{key}}}"), value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breach_id_is_stable_for_identical_inputs() {
        let probe = ProbeId::new("p1");
        let rule = RuleId::new("r1");
        assert_eq!(breach_id(&probe, &rule), "p1:r1:breach");
        assert_eq!(breach_id(&probe, &rule), breach_id(&probe, &rule));
    }

    #[test]
    fn change_id_is_deterministic_across_calls() {
        let probe = ProbeId::new("p1");
        let rule = RuleId::new("r1");
        let first = change_id(&probe, &rule, "A", "B");
        let second = change_id(&probe, &rule, "A", "B");
        assert_eq!(first, second);
        assert_ne!(first, change_id(&probe, &rule, "B", "C"));
    }

    #[test]
    fn hash8_matches_known_sha256_prefix() {
        // sha256("A->B") = 2f14...; assert length and determinism rather than
        // pinning an external digest by hand.
        let digest = hash8("A->B");
        assert_eq!(digest.len(), 8);
        assert_eq!(digest, hash8("A->B"));
        assert_ne!(digest, hash8("B->A"));
    }

    #[test]
    fn render_template_substitutes_known_placeholders() {
        let mut subs = BTreeMap::new();
        subs.insert("value", "20".to_string());
        subs.insert("threshold", "15".to_string());
        let rendered = render_template("Value ${value} crossed threshold ${threshold}", &subs);
        assert_eq!(rendered, "Value 20 crossed threshold 15");
    }
}
