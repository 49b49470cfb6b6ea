// crates/monitord-core/src/traits.rs
// ============================================================================
// Module: Plugin Contracts
// Description: Backend-agnostic interfaces for probes, rules, platforms,
//              channels, and durable state.
// Purpose: Define explicit capability interfaces so the registry and
//          scheduler store concrete instances behind these traits with no
//          runtime type sniffing.
// Dependencies: async-trait, crate::{alert, descriptor, facts, state, error}
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;

use crate::alert::Alert;
use crate::descriptor::PlatformDescriptor;
use crate::descriptor::ProbeDescriptor;
use crate::error::ChannelError;
use crate::error::PlatformError;
use crate::error::ProbeError;
use crate::error::RuleError;
use crate::error::StoreError;
use crate::facts::Facts;
use crate::identifiers::ProbeId;
use crate::identifiers::RuleId;
use crate::state::DedupRecord;
use crate::state::ProbeState;
use crate::state::RunRecord;
use crate::state::RunStatus;
use crate::time::MillisSinceEpoch;

// ============================================================================
// SECTION: Probe
// ============================================================================

/// A scheduled collector that produces a bag of facts from one logical
/// upstream.
///
/// A probe is stateless between runs except through the `probe` namespace
/// of the [`ProbeState`] it is given, which it may read and mutate in
/// place.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Collects facts for this run, given the probe's (possibly mutated)
    /// persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] only for conditions the scheduler should
    /// record as a run-level failure; recoverable upstream issues should be
    /// recorded as null-valued facts instead.
    async fn collect(&self, state: &mut ProbeState) -> Result<Facts, ProbeError>;
}

// ============================================================================
// SECTION: Rule
// ============================================================================

/// Context supplied to a rule at evaluation time.
pub struct RuleContext<'a> {
    /// Identifier of the probe this rule is evaluated against.
    pub probe_id: &'a ProbeId,
    /// Mutable reference into the same [`ProbeState`] the scheduler loaded
    /// for this run; the rule may read/write only its own `rule[rule_id]`
    /// slot.
    pub state: &'a mut ProbeState,
    /// Run timestamp, milliseconds since Unix epoch.
    pub timestamp: MillisSinceEpoch,
}

/// A pure-ish evaluator over a fact bag and its own private persistent
/// slot; yields zero or more alerts.
///
/// A rule must only write `state.rule[self.id()]`, and must be
/// deterministic given the same `(facts, prior_state)`.
pub trait Rule: Send + Sync {
    /// Returns this rule's identifier.
    fn id(&self) -> &RuleId;

    /// Evaluates the rule against the current fact bag.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when evaluation cannot proceed; per §4.6 step
    /// 6 the scheduler logs and skips a failing rule without aborting the
    /// run.
    fn evaluate(&self, facts: &Facts, ctx: &mut RuleContext<'_>) -> Result<Vec<Alert>, RuleError>;
}

// ============================================================================
// SECTION: Platform
// ============================================================================

/// A plugin family providing probe implementations and their shared
/// upstream clients.
///
/// A platform must not leak threads or sockets beyond `destroy()`
/// returning.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Returns this platform's static descriptor.
    fn describe(&self) -> &PlatformDescriptor;

    /// Initializes the platform with its (already-validated) configuration
    /// bag.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InitializationFailed`] on failure; a
    /// failure here aborts engine startup.
    async fn initialize(&self, config: serde_json::Value) -> Result<(), PlatformError>;

    /// Mints a concrete [`Probe`] for the given probe type and descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnsupportedProbeType`] when `probe_type` is
    /// outside `describe().supported_probe_types`, or
    /// [`PlatformError::ProbeCreationFailed`] for any other failure.
    fn create_probe(
        &self,
        probe_type: &str,
        descriptor: &ProbeDescriptor,
    ) -> Result<std::sync::Arc<dyn Probe>, PlatformError>;

    /// Releases every resource the platform owns (clients, sockets,
    /// background tasks).
    async fn destroy(&self);

    /// Reports whether the platform's upstream(s) currently appear healthy.
    async fn health_check(&self) -> bool;
}

// ============================================================================
// SECTION: Channel
// ============================================================================

/// A delivery transport invoked by the alert pipeline's fan-out stage.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Returns this channel's name, used only for logging.
    fn name(&self) -> &str;

    /// Delivers the alert.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] on transport-level failure; the pipeline
    /// logs and continues with the remaining channels.
    async fn send(&self, alert: &Alert) -> Result<(), ChannelError>;
}

// ============================================================================
// SECTION: State Store
// ============================================================================

/// Durable key/value persistence for probe state, rule state, dedup
/// records, cooldown records, and run history.
///
/// Implementations are expected to be used by a single engine instance; this
/// is not a multi-writer store. All operations are synchronous and atomic
/// at the record level.
pub trait StateStore: Send + Sync {
    /// Loads a probe's persisted state, or an empty state if the probe has
    /// never run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O or decode failure; absence of prior
    /// state is never an error.
    fn load_probe_state(&self, probe_id: &ProbeId) -> Result<ProbeState, StoreError>;

    /// Upserts a probe's state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn save_probe_state(&self, probe_id: &ProbeId, state: &ProbeState) -> Result<(), StoreError>;

    /// Returns true iff a dedup record exists for `alert_id` and, when `ttl`
    /// is given, it was recorded less than `ttl` ago.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn is_alert_sent(&self, alert_id: &str, ttl: Option<Duration>) -> Result<bool, StoreError>;

    /// Records that `alert_id` was sent; insert-or-ignore semantics, a
    /// second call with the same id is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn record_alert(&self, alert_id: &str, probe_id: &ProbeId, rule_id: &RuleId) -> Result<(), StoreError>;

    /// Returns true iff a cooldown record exists for `key` and
    /// `now - last_sent_at < window`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn is_in_cooldown(&self, key: &str, window: Duration) -> Result<bool, StoreError>;

    /// Upserts a cooldown record for `key`, setting `last_sent_at = now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn record_cooldown(&self, key: &str) -> Result<(), StoreError>;

    /// Appends a run-history row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn record_run(
        &self,
        probe_id: &ProbeId,
        status: RunStatus,
        duration_ms: u64,
        error_message: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Returns the most recent dedup records, newest first, bounded by
    /// `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn recent_alerts(&self, limit: usize) -> Result<Vec<DedupRecord>, StoreError>;

    /// Returns the most recent run-history rows, newest first, bounded by
    /// `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError>;
}
