// crates/monitord-core/src/rule_kinds.rs
// ============================================================================
// Module: Closed Rule Kinds
// Description: The threshold and change rule implementations, and the
//              factory that resolves a RuleDescriptor into one of them.
// Purpose: Convert observed facts into zero-or-one alerts per rule kind:
//          convert an untrusted observation into a deterministic outcome,
//          fail closed (no alert) on uncoercible input rather than erroring.
// Dependencies: crate::{alert, descriptor, facts, state, traits, identifiers}
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;

use crate::alert::Alert;
use crate::alert::Severity;
use crate::alert::breach_id;
use crate::alert::change_id;
use crate::alert::render_template;
use crate::descriptor::Operator;
use crate::descriptor::RuleDescriptor;
use crate::descriptor::RuleKind;
use crate::error::RuleError;
use crate::facts::Facts;
use crate::identifiers::RuleId;
use crate::traits::Rule;
use crate::traits::RuleContext;

const DEFAULT_THRESHOLD_SEVERITY: Severity = Severity::Warning;
const DEFAULT_THRESHOLD_TITLE: &str = "Threshold Breached";
const DEFAULT_CHANGE_SEVERITY: Severity = Severity::Info;

/// Hysteresis state for a threshold rule, persisted as a JSON string under
/// `state.rule[rule_id]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HysteresisStatus {
    Ok,
    Triggered,
}

impl HysteresisStatus {
    fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("triggered") => Self::Triggered,
            _ => Self::Ok,
        }
    }

    fn as_value(self) -> Value {
        match self {
            Self::Ok => Value::from("ok"),
            Self::Triggered => Value::from("triggered"),
        }
    }
}

/// A numeric threshold crossing rule with hysteresis: exactly one alert is
/// emitted on the `ok -> triggered` edge; the rule clears silently back to
/// `ok` when the fact falls back below threshold.
pub struct ThresholdRule {
    id: RuleId,
    fact: String,
    operator: Operator,
    threshold: f64,
    severity: Severity,
    title: String,
    message_template: Option<String>,
}

impl ThresholdRule {
    /// Builds a threshold rule from a descriptor already known to carry
    /// [`RuleKind::Threshold`] fields.
    #[must_use]
    pub fn new(id: RuleId, fact: String, operator: Operator, threshold: f64, severity: Option<Severity>, title: Option<String>, message_template: Option<String>) -> Self {
        Self {
            id,
            fact,
            operator,
            threshold,
            severity: severity.unwrap_or(DEFAULT_THRESHOLD_SEVERITY),
            title: title.unwrap_or_else(|| DEFAULT_THRESHOLD_TITLE.to_string()),
            message_template,
        }
    }
}

impl Rule for ThresholdRule {
    fn id(&self) -> &RuleId {
        &self.id
    }

    fn evaluate(&self, facts: &Facts, ctx: &mut RuleContext<'_>) -> Result<Vec<Alert>, RuleError> {
        let Some(raw) = facts.get(&self.fact) else {
            return Ok(Vec::new());
        };
        let Some(value) = raw.coerce_numeric() else {
            return Ok(Vec::new());
        };

        let triggered = self.operator.apply(value, self.threshold);
        let previous = HysteresisStatus::from_value(ctx.state.rule_value(&self.id));

        let alerts = match (previous, triggered) {
            (HysteresisStatus::Ok, true) => {
                let mut substitutions = BTreeMap::new();
                substitutions.insert("value", format!("{value}"));
                substitutions.insert("threshold", format!("{}", self.threshold));
                let message = self.message_template.as_deref().map_or_else(
                    || format!("Value {value} crossed threshold {}", self.threshold),
                    |template| render_template(template, &substitutions),
                );
                let mut entities = BTreeMap::new();
                entities.insert("Value".to_string(), format!("{value}"));
                entities.insert("Threshold".to_string(), format!("{}", self.threshold));
                vec![Alert {
                    id: breach_id(ctx.probe_id, &self.id),
                    probe_id: ctx.probe_id.clone(),
                    rule_id: self.id.clone(),
                    severity: self.severity,
                    title: self.title.clone(),
                    message,
                    timestamp: ctx.timestamp,
                    entities,
                    links: Vec::new(),
                }]
            }
            _ => Vec::new(),
        };

        let next = if triggered { HysteresisStatus::Triggered } else { HysteresisStatus::Ok };
        ctx.state.set_rule_value(&self.id, next.as_value());
        Ok(alerts)
    }
}

/// A value-change detection rule: the first observation is stored silently;
/// every subsequent distinct value produces exactly one alert.
pub struct ChangeRule {
    id: RuleId,
    fact: String,
    severity: Severity,
    title: Option<String>,
    message_template: Option<String>,
}

impl ChangeRule {
    /// Builds a change rule from a descriptor already known to carry
    /// [`RuleKind::Change`].
    #[must_use]
    pub fn new(id: RuleId, fact: String, severity: Option<Severity>, title: Option<String>, message_template: Option<String>) -> Self {
        Self {
            id,
            fact,
            severity: severity.unwrap_or(DEFAULT_CHANGE_SEVERITY),
            title,
            message_template,
        }
    }
}

impl Rule for ChangeRule {
    fn id(&self) -> &RuleId {
        &self.id
    }

    fn evaluate(&self, facts: &Facts, ctx: &mut RuleContext<'_>) -> Result<Vec<Alert>, RuleError> {
        let Some(raw) = facts.get(&self.fact) else {
            return Ok(Vec::new());
        };
        let new_value = raw.display_string();

        let previous = ctx.state.rule_value(&self.id).and_then(Value::as_str).map(str::to_string);

        let alerts = match previous {
            None => Vec::new(),
            Some(old_value) if old_value == new_value => Vec::new(),
            Some(old_value) => {
                let mut substitutions = BTreeMap::new();
                substitutions.insert("old", old_value.clone());
                substitutions.insert("new", new_value.clone());
                let message = self.message_template.as_deref().map_or_else(
                    || format!("{} changed from {old_value} to {new_value}", self.fact),
                    |template| render_template(template, &substitutions),
                );
                let mut entities = BTreeMap::new();
                entities.insert("Old".to_string(), old_value.clone());
                entities.insert("New".to_string(), new_value.clone());
                vec![Alert {
                    id: change_id(ctx.probe_id, &self.id, &old_value, &new_value),
                    probe_id: ctx.probe_id.clone(),
                    rule_id: self.id.clone(),
                    severity: self.severity,
                    title: self.title.clone().unwrap_or_else(|| "Value Changed".to_string()),
                    message,
                    timestamp: ctx.timestamp,
                    entities,
                    links: Vec::new(),
                }]
            }
        };

        ctx.state.set_rule_value(&self.id, Value::from(new_value));
        Ok(alerts)
    }
}

/// Resolves a [`RuleDescriptor`] into a concrete [`Rule`] from the closed
/// rule-kind set. Adding a kind means adding a match arm here, deliberately
/// — this is a first-class change, not a configuration-only one.
#[must_use]
pub fn build_rule(descriptor: &RuleDescriptor) -> Box<dyn Rule> {
    match &descriptor.kind {
        RuleKind::Threshold { operator, threshold } => Box::new(ThresholdRule::new(
            descriptor.id.clone(),
            descriptor.fact.clone(),
            *operator,
            *threshold,
            descriptor.severity,
            descriptor.title.clone(),
            descriptor.message_template.clone(),
        )),
        RuleKind::Change => Box::new(ChangeRule::new(
            descriptor.id.clone(),
            descriptor.fact.clone(),
            descriptor.severity,
            descriptor.title.clone(),
            descriptor.message_template.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::ProbeId;
    use crate::state::ProbeState;

    fn facts_with(key: &str, value: crate::facts::FactValue) -> Facts {
        let mut facts = Facts::new();
        facts.insert(key.to_string(), value);
        facts
    }

    #[test]
    fn threshold_hysteresis_emits_exactly_once_while_continuously_triggered() {
        let rule = ThresholdRule::new(RuleId::new("r"), "metric.x".to_string(), Operator::GreaterThan, 15.0, None, None, None);
        let probe_id = ProbeId::new("p");
        let mut state = ProbeState::empty();

        let sequence = [10.0, 20.0, 30.0, 20.0, 10.0];
        let mut emitted = 0;
        for value in sequence {
            let facts = facts_with("metric.x", crate::facts::FactValue::Float(value));
            let mut ctx = RuleContext { probe_id: &probe_id, state: &mut state, timestamp: 0 };
            let alerts = rule.evaluate(&facts, &mut ctx).expect("evaluates");
            emitted += alerts.len();
        }
        assert_eq!(emitted, 1);

        // Falls back to "ok", so a later re-crossing emits again (second
        // alert shares the same id, which is where the pipeline's dedup
        // stage — not the rule — makes the suppression decision).
        let facts = facts_with("metric.x", crate::facts::FactValue::Float(25.0));
        let mut ctx = RuleContext { probe_id: &probe_id, state: &mut state, timestamp: 0 };
        let alerts = rule.evaluate(&facts, &mut ctx).expect("evaluates");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "p:r:breach");
    }

    #[test]
    fn threshold_missing_or_non_numeric_fact_never_alerts() {
        let rule = ThresholdRule::new(RuleId::new("r"), "metric.x".to_string(), Operator::GreaterThan, 15.0, None, None, None);
        let probe_id = ProbeId::new("p");
        let mut state = ProbeState::empty();
        let facts = facts_with("metric.x", crate::facts::FactValue::String("n/a".to_string()));
        let mut ctx = RuleContext { probe_id: &probe_id, state: &mut state, timestamp: 0 };
        assert!(rule.evaluate(&facts, &mut ctx).expect("evaluates").is_empty());

        let empty_facts = Facts::new();
        let mut ctx = RuleContext { probe_id: &probe_id, state: &mut state, timestamp: 0 };
        assert!(rule.evaluate(&empty_facts, &mut ctx).expect("evaluates").is_empty());
    }

    #[test]
    fn change_rule_first_touch_never_alerts_then_alerts_on_every_transition() {
        let rule = ChangeRule::new(RuleId::new("r"), "status.value".to_string(), None, None, None);
        let probe_id = ProbeId::new("p");
        let mut state = ProbeState::empty();

        let sequence = ["A", "A", "B", "B", "C", "A"];
        let mut ids = Vec::new();
        for value in sequence {
            let facts = facts_with("status.value", crate::facts::FactValue::String(value.to_string()));
            let mut ctx = RuleContext { probe_id: &probe_id, state: &mut state, timestamp: 0 };
            let alerts = rule.evaluate(&facts, &mut ctx).expect("evaluates");
            ids.extend(alerts.into_iter().map(|alert| alert.id));
        }

        assert_eq!(
            ids,
            vec![
                change_id(&probe_id, &RuleId::new("r"), "A", "B"),
                change_id(&probe_id, &RuleId::new("r"), "B", "C"),
                change_id(&probe_id, &RuleId::new("r"), "C", "A"),
            ]
        );
    }
}
