// crates/monitord-core/src/state.rs
// ============================================================================
// Module: Probe & Run State
// Description: Per-probe continuity state, and the append-only run/alert
//              records persisted by the store.
// Purpose: Capture cross-run continuity for probes and rules, and the
//          bookkeeping records the alert pipeline and admin surface read.
// Dependencies: serde, serde_json, crate::identifiers, crate::time
// ============================================================================

//! A rule only ever reads/writes keys under `state.rule[rule_id]`; the
//! `probe` namespace is written only by the probe implementation. State is
//! loaded once at the start of a run, mutated in memory by the probe and its
//! rules, and persisted atomically at the end by the scheduler — rules never
//! persist state directly.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::ProbeId;
use crate::identifiers::RuleId;
use crate::time::MillisSinceEpoch;

/// Per-probe continuity state, persisted between scheduler runs.
///
/// # Invariants
/// - `rule[rule_id]` is written only by the rule identified by `rule_id`.
/// - `probe` is written only by the owning probe implementation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeState {
    /// Free-form continuity data owned by the probe implementation.
    pub probe: BTreeMap<String, Value>,
    /// Continuity data owned by each rule, keyed by rule id.
    pub rule: BTreeMap<RuleId, Value>,
}

impl ProbeState {
    /// Returns an empty state, as returned by the store when a probe has
    /// never run.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads a rule's private continuity value.
    #[must_use]
    pub fn rule_value(&self, rule_id: &RuleId) -> Option<&Value> {
        self.rule.get(rule_id)
    }

    /// Writes a rule's private continuity value.
    pub fn set_rule_value(&mut self, rule_id: &RuleId, value: Value) {
        self.rule.insert(rule_id.clone(), value);
    }

    /// Returns the `muted_until` timestamp (ms since epoch) if the probe is
    /// currently muted, per §4.6 `Mute`.
    #[must_use]
    pub fn muted_until(&self) -> Option<MillisSinceEpoch> {
        self.probe.get("muted_until").and_then(Value::as_i64)
    }

    /// Returns true when `muted_until` is set and still in the future
    /// relative to `now`.
    #[must_use]
    pub fn is_muted_at(&self, now: MillisSinceEpoch) -> bool {
        self.muted_until().is_some_and(|until| until > now)
    }

    /// Sets `muted_until` to `now + minutes * 60_000`.
    pub fn mute_until(&mut self, now: MillisSinceEpoch, minutes: u32) {
        let until = now.saturating_add(i64::from(minutes).saturating_mul(60_000));
        self.probe.insert("muted_until".to_string(), Value::from(until));
    }

    /// Removes `muted_until`, per §4.6 `Unmute`.
    pub fn unmute(&mut self) {
        self.probe.remove("muted_until");
    }
}

/// Outcome of a single probe run, recorded in the run history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run completed without error.
    Success,
    /// The run failed (timeout, collection error, or an uncaught panic
    /// boundary translated into an error by the scheduler).
    Error,
}

/// A single append-only run-history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Probe this run belongs to.
    pub probe_id: ProbeId,
    /// Outcome of the run.
    pub status: RunStatus,
    /// Elapsed wall-clock time for the run, in milliseconds.
    pub duration_ms: u64,
    /// Error message when `status` is [`RunStatus::Error`].
    pub error_message: Option<String>,
    /// When the run was recorded, milliseconds since Unix epoch.
    pub created_at: MillisSinceEpoch,
}

/// A recorded "alert was sent" dedup marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    /// Stable alert id.
    pub alert_id: String,
    /// Probe that produced the alert.
    pub probe_id: ProbeId,
    /// Rule that produced the alert.
    pub rule_id: RuleId,
    /// When the alert was recorded as sent, milliseconds since Unix epoch.
    pub sent_at: MillisSinceEpoch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_isolation_between_two_rules() {
        let mut state = ProbeState::empty();
        let r1 = RuleId::new("r1");
        let r2 = RuleId::new("r2");
        state.set_rule_value(&r1, Value::from("ok"));
        assert_eq!(state.rule_value(&r2), None);
        state.set_rule_value(&r2, Value::from("triggered"));
        assert_eq!(state.rule_value(&r1), Some(&Value::from("ok")));
        assert_eq!(state.rule_value(&r2), Some(&Value::from("triggered")));
    }

    #[test]
    fn mute_then_unmute_round_trips() {
        let mut state = ProbeState::empty();
        assert!(!state.is_muted_at(1_000));
        state.mute_until(1_000, 30);
        assert!(state.is_muted_at(1_000));
        assert!(state.is_muted_at(1_000 + 29 * 60_000));
        assert!(!state.is_muted_at(1_000 + 31 * 60_000));
        state.unmute();
        assert!(!state.is_muted_at(1_000));
    }
}
