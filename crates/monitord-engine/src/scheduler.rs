// crates/monitord-engine/src/scheduler.rs
// ============================================================================
// Module: Scheduler (ProbeRunner)
// Description: Timer-driven per-probe execution with single-flight lock,
//              watchdog, per-run deadline, and dynamic enable/disable/mute.
// Purpose: Own every probe's lifecycle and the activeLocks table; the one
//          writer of persisted ProbeState, per §3 Ownership.
// Dependencies: monitord-core, monitord-dispatch, tokio, tracing
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use monitord_core::alert::stuck_id;
use monitord_core::alert::Severity;
use monitord_core::descriptor::ProbeDescriptor;
use monitord_core::error::StoreError;
use monitord_core::facts::validate_fact_key;
use monitord_core::identifiers::ProbeId;
use monitord_core::identifiers::RuleId;
use monitord_core::state::DedupRecord;
use monitord_core::state::ProbeState;
use monitord_core::state::RunRecord;
use monitord_core::state::RunStatus;
use monitord_core::time::Clock;
use monitord_core::time::MillisSinceEpoch;
use monitord_core::traits::Probe;
use monitord_core::traits::Rule;
use monitord_core::traits::RuleContext;
use monitord_core::traits::StateStore;
use thiserror::Error;

use crate::blocking::run_store;
use crate::pipeline::AlertPipeline;

/// Default deadline, in milliseconds, for a manually triggered `RunOnce`.
/// A scheduled tick instead uses the probe's own descriptor timeout; only
/// the manual-trigger path is bounded by this constant.
pub const DEFAULT_RUN_ONCE_TIMEOUT_MS: u64 = 15_000;

/// Errors from scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The referenced `probe_id` has no registered probe, per §6's
    /// "distinct not-found error" requirement.
    #[error("probe '{id}' is not registered")]
    UnknownProbe {
        /// The missing probe identifier.
        id: String,
    },
    /// A store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct ProbeRuntime {
    descriptor: ProbeDescriptor,
    probe: Arc<dyn Probe>,
    rules: Arc<Vec<Box<dyn Rule>>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

/// Owns every registered probe's timer, single-flight lock, and execution
/// pipeline invocation.
///
/// # Invariants
/// - At most one [`Probe::collect`] is in flight per `probe_id` at any
///   instant, except within the `2 * timeout` watchdog window.
/// - The scheduler is the sole writer of persisted [`ProbeState`]; rules and
///   probes only mutate the in-memory copy handed to them for one run.
pub struct Scheduler {
    store: Arc<dyn StateStore>,
    pipeline: Arc<AlertPipeline>,
    clock: Arc<dyn Clock>,
    probes: Mutex<BTreeMap<ProbeId, ProbeRuntime>>,
    active_locks: Mutex<BTreeMap<ProbeId, MillisSinceEpoch>>,
}

impl Scheduler {
    /// Builds a scheduler with no registered probes.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, pipeline: Arc<AlertPipeline>, clock: Arc<dyn Clock>) -> Self {
        Self { store, pipeline, clock, probes: Mutex::new(BTreeMap::new()), active_locks: Mutex::new(BTreeMap::new()) }
    }

    /// Registers a probe and its rule set, without arming its timer.
    pub fn register(&self, descriptor: ProbeDescriptor, probe: Arc<dyn Probe>, rules: Vec<Box<dyn Rule>>) {
        let id = descriptor.id.clone();
        #[allow(clippy::unwrap_used)]
        self.probes.lock().unwrap().insert(id, ProbeRuntime { descriptor, probe, rules: Arc::new(rules), task: None });
    }

    /// Arms every registered, enabled probe's timer and kicks off its first
    /// immediate run, per §4.6 start-up.
    pub fn start_all(self: &Arc<Self>) {
        let ids: Vec<ProbeId> = {
            #[allow(clippy::unwrap_used)]
            let probes = self.probes.lock().unwrap();
            probes.iter().filter(|(_, runtime)| runtime.descriptor.enabled).map(|(id, _)| id.clone()).collect()
        };
        for id in ids {
            self.enable(&id);
        }
    }

    /// Returns every registered probe's descriptor, for the façade's
    /// `listProbes`.
    #[must_use]
    pub fn list_probes(&self) -> Vec<ProbeDescriptor> {
        #[allow(clippy::unwrap_used)]
        self.probes.lock().unwrap().values().map(|runtime| runtime.descriptor.clone()).collect()
    }

    /// Loads a probe's persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownProbe`] or a propagated store error.
    pub async fn load_probe_state(&self, probe_id: &ProbeId) -> Result<ProbeState, SchedulerError> {
        self.require_registered(probe_id)?;
        let store = Arc::clone(&self.store);
        let id = probe_id.clone();
        Ok(run_store(move || store.load_probe_state(&id)).await?)
    }

    /// Returns the most recent dedup records.
    ///
    /// # Errors
    ///
    /// Returns a propagated store error.
    pub async fn recent_alerts(&self, limit: usize) -> Result<Vec<DedupRecord>, SchedulerError> {
        let store = Arc::clone(&self.store);
        Ok(run_store(move || store.recent_alerts(limit)).await?)
    }

    /// Returns the most recent run-history rows.
    ///
    /// # Errors
    ///
    /// Returns a propagated store error.
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, SchedulerError> {
        let store = Arc::clone(&self.store);
        Ok(run_store(move || store.recent_runs(limit)).await?)
    }

    /// Arms `probe_id`'s periodic timer and kicks off an immediate run.
    /// Idempotent: a probe whose timer is already armed is left untouched.
    /// Silently returns if `probe_id` is not registered.
    pub fn enable(self: &Arc<Self>, probe_id: &ProbeId) {
        let interval = {
            #[allow(clippy::unwrap_used)]
            let mut probes = self.probes.lock().unwrap();
            let Some(runtime) = probes.get_mut(probe_id) else { return };
            if runtime.task.is_some() {
                return;
            }
            Duration::from_secs(runtime.descriptor.interval)
        };

        let scheduler = Arc::clone(self);
        let id = probe_id.clone();
        let handle = tokio::spawn(async move {
            loop {
                let run_scheduler = Arc::clone(&scheduler);
                let run_id = id.clone();
                tokio::spawn(async move {
                    if let Err(err) = run_scheduler.run_gated(&run_id, None).await {
                        tracing::error!(probe_id = %run_id, error = %err, "scheduled run failed");
                    }
                });
                tokio::time::sleep(interval).await;
            }
        });

        #[allow(clippy::unwrap_used)]
        if let Some(runtime) = self.probes.lock().unwrap().get_mut(probe_id) {
            runtime.task = Some(handle);
        }
    }

    /// Cancels `probe_id`'s periodic timer. Idempotent.
    pub fn disable(&self, probe_id: &ProbeId) {
        #[allow(clippy::unwrap_used)]
        if let Some(runtime) = self.probes.lock().unwrap().get_mut(probe_id) {
            if let Some(handle) = runtime.task.take() {
                handle.abort();
            }
        }
    }

    /// Writes `muted_until = now + minutes * 60_000` into the probe's
    /// persisted state, per §4.6 `Mute`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownProbe`] or a propagated store error.
    pub async fn mute(&self, probe_id: &ProbeId, minutes: u32) -> Result<(), SchedulerError> {
        self.require_registered(probe_id)?;
        let now = self.clock.now_millis();
        self.mutate_state(probe_id, move |state| state.mute_until(now, minutes)).await
    }

    /// Removes `muted_until` from the probe's persisted state, per §4.6
    /// `Unmute`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownProbe`] or a propagated store error.
    pub async fn unmute(&self, probe_id: &ProbeId) -> Result<(), SchedulerError> {
        self.require_registered(probe_id)?;
        self.mutate_state(probe_id, ProbeState::unmute).await
    }

    /// Cancels every probe's timer and clears the lock table. Running tasks
    /// observe cancellation at their next suspension point; nothing is
    /// force-killed.
    pub fn stop(&self) {
        #[allow(clippy::unwrap_used)]
        let mut probes = self.probes.lock().unwrap();
        for runtime in probes.values_mut() {
            if let Some(handle) = runtime.task.take() {
                handle.abort();
            }
        }
        drop(probes);
        #[allow(clippy::unwrap_used)]
        self.active_locks.lock().unwrap().clear();
    }

    /// Executes one run of `probe_id` immediately, bounded by
    /// [`DEFAULT_RUN_ONCE_TIMEOUT_MS`] rather than the probe's own
    /// descriptor timeout, honoring the single-flight gate exactly as a
    /// scheduled tick would.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownProbe`] if `probe_id` is not
    /// registered, or a propagated store error.
    pub async fn run_once(self: &Arc<Self>, probe_id: &ProbeId) -> Result<(), SchedulerError> {
        self.run_gated(probe_id, Some(Duration::from_millis(DEFAULT_RUN_ONCE_TIMEOUT_MS))).await
    }

    /// Single-flight-gated execution shared by the periodic timer and the
    /// manual `run_once` trigger. `deadline_override` is `Some` for a manual
    /// trigger (bounded by a fixed deadline regardless of the probe's own
    /// timeout) and `None` for a scheduled tick (bounded by
    /// `descriptor.timeout`).
    ///
    /// The gate decision and the lock stamp happen inside one critical
    /// section on `active_locks`: a stale lock is force-released and
    /// immediately re-stamped with `now` before the mutex is released, so no
    /// other caller can observe the gap and also proceed. The watchdog alert
    /// is only fired once the fresh lock is held.
    async fn run_gated(self: &Arc<Self>, probe_id: &ProbeId, deadline_override: Option<Duration>) -> Result<(), SchedulerError> {
        let (descriptor, probe, rules) = {
            #[allow(clippy::unwrap_used)]
            let probes = self.probes.lock().unwrap();
            let runtime = probes.get(probe_id).ok_or_else(|| SchedulerError::UnknownProbe { id: probe_id.to_string() })?;
            (runtime.descriptor.clone(), Arc::clone(&runtime.probe), Arc::clone(&runtime.rules))
        };

        let deadline = deadline_override.unwrap_or_else(|| Duration::from_millis(descriptor.timeout));
        let stale_after = i64::try_from(deadline.as_millis()).unwrap_or(i64::MAX).saturating_mul(2);
        let now = self.clock.now_millis();

        enum Gate {
            Skip,
            Proceed,
            WatchdogThenProceed,
        }

        let gate = {
            #[allow(clippy::unwrap_used)]
            let mut locks = self.active_locks.lock().unwrap();
            match locks.get(probe_id).copied() {
                None => {
                    locks.insert(probe_id.clone(), now);
                    Gate::Proceed
                }
                Some(acquired_at) => {
                    if now.saturating_sub(acquired_at) <= stale_after {
                        Gate::Skip
                    } else {
                        locks.insert(probe_id.clone(), now);
                        Gate::WatchdogThenProceed
                    }
                }
            }
        };

        match gate {
            Gate::Skip => {
                tracing::debug!(probe_id = %probe_id, "single-flight gate: run already in flight, skipping tick");
                return Ok(());
            }
            Gate::WatchdogThenProceed => {
                tracing::warn!(probe_id = %probe_id, "watchdog: stale single-flight lock force-released");
                self.fire_watchdog_alert(probe_id, now).await;
            }
            Gate::Proceed => {}
        }

        let acquired_at = now;
        let result = self.execute(probe_id, &probe, &rules, acquired_at, deadline).await;
        self.release_lock_if_current(probe_id, acquired_at);
        result
    }

    async fn fire_watchdog_alert(&self, probe_id: &ProbeId, now: MillisSinceEpoch) {
        let alert = monitord_core::alert::Alert {
            id: stuck_id(probe_id),
            probe_id: probe_id.clone(),
            rule_id: RuleId::new("system"),
            severity: Severity::Critical,
            title: "Probe Stuck".to_string(),
            message: format!("probe '{probe_id}' exceeded its watchdog threshold and was force-released"),
            timestamp: now,
            entities: BTreeMap::new(),
            links: Vec::new(),
        };
        let empty_state = ProbeState::empty();
        if let Err(err) = self.pipeline.process(&alert, &empty_state).await {
            tracing::error!(probe_id = %probe_id, error = %err, "failed to deliver watchdog alert");
        }
    }

    async fn execute(self: &Arc<Self>, probe_id: &ProbeId, probe: &Arc<dyn Probe>, rules: &Arc<Vec<Box<dyn Rule>>>, acquired_at: MillisSinceEpoch, deadline: Duration) -> Result<(), SchedulerError> {
        let start = self.clock.now_millis();

        let mut state = match self.load_probe_state(probe_id).await {
            Ok(state) => state,
            Err(err) => return Err(err),
        };

        let collected = tokio::time::timeout(deadline, probe.collect(&mut state)).await;

        let facts = match collected {
            Ok(Ok(facts)) => facts,
            Ok(Err(err)) => {
                let elapsed = elapsed_ms(start, self.clock.now_millis());
                self.record_run(probe_id, RunStatus::Error, elapsed, Some(&err.to_string())).await?;
                return Ok(());
            }
            Err(_elapsed) => {
                let elapsed = elapsed_ms(start, self.clock.now_millis());
                self.record_run(probe_id, RunStatus::Error, elapsed, Some("Probe timeout")).await?;
                return Ok(());
            }
        };

        for key in facts.keys() {
            if let Some(warning) = validate_fact_key(key) {
                tracing::warn!(probe_id = %probe_id, %warning, "invalid fact key");
            }
        }

        let timestamp = self.clock.now_millis();
        let mut alerts = Vec::new();
        for rule in rules.iter() {
            let mut ctx = RuleContext { probe_id, state: &mut state, timestamp };
            match rule.evaluate(&facts, &mut ctx) {
                Ok(mut produced) => alerts.append(&mut produced),
                Err(err) => tracing::warn!(probe_id = %probe_id, rule_id = %rule.id(), error = %err, "rule evaluation failed, skipping rule"),
            }
        }

        for alert in &alerts {
            if let Err(err) = self.pipeline.process(alert, &state).await {
                tracing::error!(probe_id = %probe_id, alert_id = %alert.id, error = %err, "alert pipeline failed");
            }
        }

        self.save_state_if_current(probe_id, acquired_at, &state).await?;
        let elapsed = elapsed_ms(start, self.clock.now_millis());
        self.record_run(probe_id, RunStatus::Success, elapsed, None).await?;
        Ok(())
    }

    async fn save_state_if_current(&self, probe_id: &ProbeId, acquired_at: MillisSinceEpoch, state: &ProbeState) -> Result<(), SchedulerError> {
        let current = {
            #[allow(clippy::unwrap_used)]
            let locks = self.active_locks.lock().unwrap();
            locks.get(probe_id).copied()
        };
        if current != Some(acquired_at) {
            tracing::warn!(probe_id = %probe_id, "lock moved on since this run acquired it; skipping stale state save");
            return Ok(());
        }
        let store = Arc::clone(&self.store);
        let id = probe_id.clone();
        let state = state.clone();
        Ok(run_store(move || store.save_probe_state(&id, &state)).await?)
    }

    fn release_lock_if_current(&self, probe_id: &ProbeId, acquired_at: MillisSinceEpoch) {
        #[allow(clippy::unwrap_used)]
        let mut locks = self.active_locks.lock().unwrap();
        if locks.get(probe_id).copied() == Some(acquired_at) {
            locks.remove(probe_id);
        }
    }

    async fn record_run(&self, probe_id: &ProbeId, status: RunStatus, duration_ms: u64, error_message: Option<&str>) -> Result<(), SchedulerError> {
        let store = Arc::clone(&self.store);
        let id = probe_id.clone();
        let message = error_message.map(str::to_string);
        Ok(run_store(move || store.record_run(&id, status, duration_ms, message.as_deref())).await?)
    }

    async fn mutate_state(&self, probe_id: &ProbeId, mutator: impl FnOnce(&mut ProbeState) + Send + 'static) -> Result<(), SchedulerError> {
        let store = Arc::clone(&self.store);
        let id = probe_id.clone();
        let mut state = run_store(move || store.load_probe_state(&id)).await?;
        mutator(&mut state);
        let store = Arc::clone(&self.store);
        let id = probe_id.clone();
        Ok(run_store(move || store.save_probe_state(&id, &state)).await?)
    }

    fn require_registered(&self, probe_id: &ProbeId) -> Result<(), SchedulerError> {
        #[allow(clippy::unwrap_used)]
        if self.probes.lock().unwrap().contains_key(probe_id) {
            Ok(())
        } else {
            Err(SchedulerError::UnknownProbe { id: probe_id.to_string() })
        }
    }
}

fn elapsed_ms(start: MillisSinceEpoch, end: MillisSinceEpoch) -> u64 {
    u64::try_from(end.saturating_sub(start)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use monitord_core::alert::Alert;
    use monitord_core::error::ChannelError;
    use monitord_core::error::ProbeError;
    use monitord_core::error::RuleError;
    use monitord_core::facts::FactValue;
    use monitord_core::facts::Facts;
    use monitord_core::identifiers::PlatformId;
    use monitord_core::time::testing::FakeClock;
    use monitord_core::traits::Channel;
    use monitord_dispatch::ChannelSet;
    use serde_json::Value;

    use super::*;
    use crate::pipeline::PipelineConfig;

    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<BTreeMap<ProbeId, ProbeState>>,
        runs: Mutex<Vec<RunRecord>>,
    }

    impl StateStore for MemoryStore {
        fn load_probe_state(&self, probe_id: &ProbeId) -> Result<ProbeState, StoreError> {
            #[allow(clippy::unwrap_used)]
            Ok(self.state.lock().unwrap().get(probe_id).cloned().unwrap_or_default())
        }

        fn save_probe_state(&self, probe_id: &ProbeId, state: &ProbeState) -> Result<(), StoreError> {
            #[allow(clippy::unwrap_used)]
            self.state.lock().unwrap().insert(probe_id.clone(), state.clone());
            Ok(())
        }

        fn is_alert_sent(&self, _alert_id: &str, _ttl: Option<Duration>) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn record_alert(&self, _alert_id: &str, _probe_id: &ProbeId, _rule_id: &RuleId) -> Result<(), StoreError> {
            Ok(())
        }

        fn is_in_cooldown(&self, _key: &str, _window: Duration) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn record_cooldown(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }

        fn record_run(&self, probe_id: &ProbeId, status: RunStatus, duration_ms: u64, error_message: Option<&str>) -> Result<(), StoreError> {
            #[allow(clippy::unwrap_used)]
            self.runs.lock().unwrap().push(RunRecord { probe_id: probe_id.clone(), status, duration_ms, error_message: error_message.map(str::to_string), created_at: 0 });
            Ok(())
        }

        fn recent_alerts(&self, _limit: usize) -> Result<Vec<DedupRecord>, StoreError> {
            Ok(Vec::new())
        }

        fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
            #[allow(clippy::unwrap_used)]
            Ok(self.runs.lock().unwrap().iter().rev().take(limit).cloned().collect())
        }
    }

    struct CountingProbe {
        calls: Arc<AtomicU32>,
        hang: bool,
    }

    #[async_trait]
    impl Probe for CountingProbe {
        async fn collect(&self, _state: &mut ProbeState) -> Result<Facts, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            let mut facts = Facts::new();
            facts.insert("test.value".to_string(), FactValue::Int(1));
            Ok(facts)
        }
    }

    struct NoopRule(RuleId);

    impl Rule for NoopRule {
        fn id(&self) -> &RuleId {
            &self.0
        }

        fn evaluate(&self, _facts: &Facts, _ctx: &mut RuleContext<'_>) -> Result<Vec<monitord_core::alert::Alert>, RuleError> {
            Ok(Vec::new())
        }
    }

    struct RecordingChannel(Arc<Mutex<Vec<Alert>>>);

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
            #[allow(clippy::unwrap_used)]
            self.0.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn descriptor(id: &str, timeout_ms: u64) -> ProbeDescriptor {
        ProbeDescriptor { id: ProbeId::new(id), platform: PlatformId::new("test"), probe_type: "test".to_string(), enabled: true, interval: 60, timeout: timeout_ms, config: Value::Null, rules: Vec::new() }
    }

    fn scheduler() -> Arc<Scheduler> {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::default());
        let pipeline = Arc::new(AlertPipeline::new(Arc::clone(&store), ChannelSet::new(), PipelineConfig::default()));
        Arc::new(Scheduler::new(store, pipeline, Arc::new(FakeClock::new(0))))
    }

    fn scheduler_with_channel(clock: Arc<FakeClock>, delivered: Arc<Mutex<Vec<Alert>>>) -> Arc<Scheduler> {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::default());
        let mut channels = ChannelSet::new();
        channels.add(Arc::new(RecordingChannel(delivered)));
        let pipeline = Arc::new(AlertPipeline::new(Arc::clone(&store), channels, PipelineConfig::default()));
        Arc::new(Scheduler::new(store, pipeline, clock))
    }

    #[tokio::test]
    async fn run_once_rejects_unknown_probe() {
        let sched = scheduler();
        let err = sched.run_once(&ProbeId::new("missing")).await.expect_err("unknown probe rejected");
        assert!(matches!(err, SchedulerError::UnknownProbe { .. }));
    }

    #[tokio::test]
    async fn successful_run_is_recorded_and_state_saved() {
        let sched = scheduler();
        let calls = Arc::new(AtomicU32::new(0));
        let id = ProbeId::new("p1");
        sched.register(descriptor("p1", 1_000), Arc::new(CountingProbe { calls: Arc::clone(&calls), hang: false }), vec![Box::new(NoopRule(RuleId::new("r1")))]);

        sched.run_once(&id).await.expect("runs");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let runs = sched.recent_runs(10).await.expect("reads runs");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Success);
    }

    #[tokio::test]
    async fn second_run_skips_while_first_holds_the_lock() {
        let sched = scheduler();
        let calls = Arc::new(AtomicU32::new(0));
        let id = ProbeId::new("p1");
        sched.register(descriptor("p1", 60_000), Arc::new(CountingProbe { calls: Arc::clone(&calls), hang: true }), Vec::new());

        let first_sched = Arc::clone(&sched);
        let first_id = id.clone();
        let _first = tokio::spawn(async move {
            let _ = first_sched.run_once(&first_id).await;
        });

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        sched.run_once(&id).await.expect("second call returns without error");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "the second call must not invoke collect while the first is in flight");
    }

    #[tokio::test(start_paused = true)]
    async fn probe_timeout_is_recorded_as_an_error_run() {
        let sched = scheduler();
        let calls = Arc::new(AtomicU32::new(0));
        let id = ProbeId::new("p1");
        sched.register(descriptor("p1", 50), Arc::new(CountingProbe { calls: Arc::clone(&calls), hang: true }), Vec::new());

        sched.run_once(&id).await.expect("a deadline is recorded as a failed run, not propagated");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let runs = sched.recent_runs(10).await.expect("reads runs");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Error);
        assert_eq!(runs[0].error_message.as_deref(), Some("Probe timeout"));
    }

    #[tokio::test]
    async fn watchdog_force_releases_a_stale_lock_and_fires_a_stuck_alert() {
        let clock = Arc::new(FakeClock::new(0));
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sched = scheduler_with_channel(Arc::clone(&clock), Arc::clone(&delivered));
        let calls = Arc::new(AtomicU32::new(0));
        let id = ProbeId::new("p1");
        sched.register(descriptor("p1", 1_000), Arc::new(CountingProbe { calls: Arc::clone(&calls), hang: false }), Vec::new());

        // Simulate an earlier run whose lock was stamped at t=0 and never released.
        #[allow(clippy::unwrap_used)]
        sched.active_locks.lock().unwrap().insert(id.clone(), 0);
        clock.set(2 * i64::try_from(DEFAULT_RUN_ONCE_TIMEOUT_MS).unwrap_or(i64::MAX) + 1);

        sched.run_once(&id).await.expect("the watchdog path still completes the run");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "the freshly stamped lock must still let the probe run");

        #[allow(clippy::unwrap_used)]
        let alerts = delivered.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, stuck_id(&id));
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn mute_then_unmute_round_trips_through_state_mutation() {
        let mut state = ProbeState::empty();
        assert!(!state.is_muted_at(1_000));
        state.mute_until(1_000, 1);
        assert!(state.is_muted_at(1_000));
        state.unmute();
        assert!(!state.is_muted_at(1_000));
    }
}
