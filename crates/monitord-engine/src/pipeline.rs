// crates/monitord-engine/src/pipeline.rs
// ============================================================================
// Module: Alert Pipeline
// Description: The mute -> dedup -> cooldown -> fan-out -> record pipeline
//              every emitted alert passes through.
// Purpose: Enforce §4.7's exact stage order so a suppress outcome at any
//          stage short-circuits every stage after it.
// Dependencies: monitord-core, monitord-dispatch, tokio
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use monitord_core::alert::Alert;
use monitord_core::error::StoreError;
use monitord_core::state::ProbeState;
use monitord_core::traits::StateStore;
use monitord_dispatch::ChannelOutcome;
use monitord_dispatch::ChannelSet;
use thiserror::Error;

use crate::blocking::run_store;

/// Errors from running an alert through the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The durable store failed during a dedup/cooldown check or record.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why an alert did or did not reach a channel.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The owning probe is muted; no stage after mute check ran.
    SuppressedMuted,
    /// `alert.id` was already recorded as sent.
    SuppressedDedup,
    /// The `(probe_id, rule_id)` pair is within its cooldown window.
    SuppressedCooldown,
    /// The alert reached fan-out and was recorded.
    Delivered {
        /// Per-channel delivery outcomes.
        channel_outcomes: Vec<ChannelOutcome>,
    },
}

/// Tuning parameters for an [`AlertPipeline`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Dedup TTL; `None` means permanent dedup until operator cleanup.
    pub dedup_ttl: Option<Duration>,
    /// Minimum elapsed time between two deliveries of the same
    /// `(probe_id, rule_id)` pair.
    pub cooldown_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { dedup_ttl: None, cooldown_window: Duration::from_secs(15 * 60) }
    }
}

/// Applies mute -> dedup -> cooldown -> fan-out -> record to every emitted
/// alert, per §4.7.
///
/// Channel failures are isolated at the fan-out stage and never prevent the
/// record stage: a failed delivery is not retried, it is still marked sent.
pub struct AlertPipeline {
    store: Arc<dyn StateStore>,
    channels: ChannelSet,
    config: PipelineConfig,
}

impl AlertPipeline {
    /// Builds a pipeline over `store` and `channels` with the given tuning.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, channels: ChannelSet, config: PipelineConfig) -> Self {
        Self { store, channels, config }
    }

    /// Runs `alert` through every stage, given the `probe_state` loaded for
    /// the run that produced it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when a store call fails; per §7
    /// `FatalStateStore`, callers should log loudly and continue rather than
    /// treat this as fatal to the run.
    pub async fn process(&self, alert: &Alert, probe_state: &ProbeState) -> Result<PipelineOutcome, PipelineError> {
        let now = alert.timestamp;
        if probe_state.is_muted_at(now) {
            return Ok(PipelineOutcome::SuppressedMuted);
        }

        let store = Arc::clone(&self.store);
        let alert_id = alert.id.clone();
        let ttl = self.config.dedup_ttl;
        if run_store(move || store.is_alert_sent(&alert_id, ttl)).await? {
            return Ok(PipelineOutcome::SuppressedDedup);
        }

        let cooldown_key = format!("{}:{}", alert.probe_id, alert.rule_id);
        let store = Arc::clone(&self.store);
        let key = cooldown_key.clone();
        let window = self.config.cooldown_window;
        if run_store(move || store.is_in_cooldown(&key, window)).await? {
            return Ok(PipelineOutcome::SuppressedCooldown);
        }

        let channel_outcomes = self.channels.dispatch(alert).await;

        let store = Arc::clone(&self.store);
        let alert_id = alert.id.clone();
        let probe_id = alert.probe_id.clone();
        let rule_id = alert.rule_id.clone();
        run_store(move || store.record_alert(&alert_id, &probe_id, &rule_id)).await?;

        let store = Arc::clone(&self.store);
        let key = cooldown_key;
        run_store(move || store.record_cooldown(&key)).await?;

        Ok(PipelineOutcome::Delivered { channel_outcomes })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use monitord_core::error::ChannelError;
    use monitord_core::identifiers::ProbeId;
    use monitord_core::identifiers::RuleId;
    use monitord_core::state::DedupRecord;
    use monitord_core::state::RunRecord;
    use monitord_core::state::RunStatus;
    use monitord_core::traits::Channel;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        sent: Mutex<BTreeMap<String, i64>>,
        cooldowns: Mutex<BTreeMap<String, i64>>,
    }

    impl StateStore for MemoryStore {
        fn load_probe_state(&self, _probe_id: &ProbeId) -> Result<ProbeState, StoreError> {
            Ok(ProbeState::empty())
        }

        fn save_probe_state(&self, _probe_id: &ProbeId, _state: &ProbeState) -> Result<(), StoreError> {
            Ok(())
        }

        fn is_alert_sent(&self, alert_id: &str, _ttl: Option<Duration>) -> Result<bool, StoreError> {
            #[allow(clippy::unwrap_used)]
            Ok(self.sent.lock().unwrap().contains_key(alert_id))
        }

        fn record_alert(&self, alert_id: &str, _probe_id: &ProbeId, _rule_id: &RuleId) -> Result<(), StoreError> {
            #[allow(clippy::unwrap_used)]
            self.sent.lock().unwrap().entry(alert_id.to_string()).or_insert(0);
            Ok(())
        }

        fn is_in_cooldown(&self, key: &str, window: Duration) -> Result<bool, StoreError> {
            #[allow(clippy::unwrap_used)]
            let cooldowns = self.cooldowns.lock().unwrap();
            Ok(cooldowns.get(key).is_some_and(|_| window.as_millis() > 0))
        }

        fn record_cooldown(&self, key: &str) -> Result<(), StoreError> {
            #[allow(clippy::unwrap_used)]
            self.cooldowns.lock().unwrap().insert(key.to_string(), 0);
            Ok(())
        }

        fn record_run(&self, _probe_id: &ProbeId, _status: RunStatus, _duration_ms: u64, _error_message: Option<&str>) -> Result<(), StoreError> {
            Ok(())
        }

        fn recent_alerts(&self, _limit: usize) -> Result<Vec<DedupRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn recent_runs(&self, _limit: usize) -> Result<Vec<RunRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    struct RecordingChannel(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
            #[allow(clippy::unwrap_used)]
            self.0.lock().unwrap().push(alert.id.clone());
            Ok(())
        }
    }

    fn alert(id: &str) -> Alert {
        Alert { id: id.to_string(), probe_id: ProbeId::new("p"), rule_id: RuleId::new("r"), severity: monitord_core::alert::Severity::Warning, title: "t".to_string(), message: "m".to_string(), timestamp: 1_000, entities: BTreeMap::new(), links: Vec::new() }
    }

    fn pipeline(sent: Arc<Mutex<Vec<String>>>) -> AlertPipeline {
        let mut channels = ChannelSet::new();
        channels.add(Arc::new(RecordingChannel(sent)));
        AlertPipeline::new(Arc::new(MemoryStore::default()), channels, PipelineConfig::default())
    }

    #[tokio::test]
    async fn muted_probe_suppresses_before_any_store_write() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let pipe = pipeline(Arc::clone(&sent));
        let mut state = ProbeState::empty();
        state.mute_until(1_000, 30);
        let outcome = pipe.process(&alert("p:r:breach"), &state).await.expect("processes");
        assert!(matches!(outcome, PipelineOutcome::SuppressedMuted));
        #[allow(clippy::unwrap_used)]
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_emission_of_the_same_id_is_deduped() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let pipe = pipeline(Arc::clone(&sent));
        let state = ProbeState::empty();
        let first = pipe.process(&alert("p:r:breach"), &state).await.expect("processes");
        assert!(matches!(first, PipelineOutcome::Delivered { .. }));
        let second = pipe.process(&alert("p:r:breach"), &state).await.expect("processes");
        assert!(matches!(second, PipelineOutcome::SuppressedDedup));
        #[allow(clippy::unwrap_used)]
        assert_eq!(sent.lock().unwrap().len(), 1);
    }
}
