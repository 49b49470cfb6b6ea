// crates/monitord-engine/src/engine.rs
// ============================================================================
// Module: Engine Facade
// Description: Bootstraps a registry, store, pipeline, and scheduler from a
//              validated configuration, and exposes the admin surface.
// Purpose: Give a host (the CLI, or any embedder) a single entry point that
//          wires every other monitord-* crate together, mirroring the
//          teacher's broker-as-composition-root shape.
// Dependencies: monitord-core, monitord-dispatch, monitord-store-sqlite,
//               monitord-config, tokio, tracing
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use monitord_config::EngineConfig;
use monitord_core::descriptor::ProbeDescriptor;
use monitord_core::identifiers::ProbeId;
use monitord_core::rule_kinds::build_rule;
use monitord_core::state::DedupRecord;
use monitord_core::state::ProbeState;
use monitord_core::state::RunRecord;
use monitord_core::time::system_clock;
use monitord_core::traits::StateStore;
use monitord_dispatch::ChannelSet;
use monitord_dispatch::DispatchError;
use monitord_dispatch::PlatformRegistry;
use monitord_store_sqlite::SqliteStateStore;
use monitord_store_sqlite::SqliteStoreError;
use thiserror::Error;

use crate::pipeline::AlertPipeline;
use crate::pipeline::PipelineConfig;
use crate::scheduler::Scheduler;
use crate::scheduler::SchedulerError;

/// Errors from bootstrapping or driving an [`Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// Opening the durable state store failed.
    #[error("failed to open state store: {0}")]
    Store(#[from] SqliteStoreError),
    /// Resolving a configured probe against the platform registry failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// A scheduler operation failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// The running monitoring daemon: a platform registry, durable store, alert
/// pipeline, and scheduler composed from a validated configuration.
///
/// This is the admin surface's sole entry point, per §6: every control
/// operation (`runOnce`, `enable`, `disable`, `mute`, `unmute`, `stop`) and
/// every read operation (`listProbes`, `listRecentAlerts`, `listRecentRuns`,
/// `loadProbeState`) is exposed here and nowhere else.
pub struct Engine {
    registry: Arc<PlatformRegistry>,
    scheduler: Arc<Scheduler>,
}

impl Engine {
    /// Resolves every configured probe against `registry`, builds its rule
    /// set, registers it with a fresh [`Scheduler`], and starts every
    /// enabled probe's timer.
    ///
    /// `registry` must already have every platform named in
    /// `config.platforms` registered and initialized; bootstrapping a
    /// platform's own client construction is the caller's responsibility,
    /// since only the caller knows which concrete [`monitord_core::traits::Platform`]
    /// implementations are linked in.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the durable store cannot be opened,
    /// or [`EngineError::Dispatch`] if a probe names an unregistered
    /// platform or an unsupported probe type.
    pub async fn bootstrap(config: &EngineConfig, registry: PlatformRegistry, channels: ChannelSet) -> Result<Self, EngineError> {
        let registry = Arc::new(registry);
        let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::open(config.store.clone())?);

        let pipeline_config = PipelineConfig {
            dedup_ttl: config.dedup_ttl_seconds.map(std::time::Duration::from_secs),
            cooldown_window: std::time::Duration::from_secs(config.cooldown_window_seconds),
        };
        let pipeline = Arc::new(AlertPipeline::new(Arc::clone(&store), channels, pipeline_config));

        let scheduler = Arc::new(Scheduler::new(Arc::clone(&store), pipeline, system_clock()));

        for probe_descriptor in &config.probes {
            register_probe(&registry, &scheduler, probe_descriptor)?;
        }

        scheduler.start_all();

        Ok(Self { registry, scheduler })
    }

    /// Returns every registered probe's descriptor.
    #[must_use]
    pub fn list_probes(&self) -> Vec<ProbeDescriptor> {
        self.scheduler.list_probes()
    }

    /// Returns the most recent dedup records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scheduler`] on a store failure.
    pub async fn list_recent_alerts(&self, limit: usize) -> Result<Vec<DedupRecord>, EngineError> {
        Ok(self.scheduler.recent_alerts(limit).await?)
    }

    /// Returns the most recent run-history rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scheduler`] on a store failure.
    pub async fn list_recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, EngineError> {
        Ok(self.scheduler.recent_runs(limit).await?)
    }

    /// Loads a probe's persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scheduler`] with [`SchedulerError::UnknownProbe`]
    /// for an unrecognized `probe_id`, or on a store failure.
    pub async fn load_probe_state(&self, probe_id: &ProbeId) -> Result<ProbeState, EngineError> {
        Ok(self.scheduler.load_probe_state(probe_id).await?)
    }

    /// Runs `probe_id` immediately, honoring the single-flight gate as a
    /// scheduled tick would.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scheduler`] with [`SchedulerError::UnknownProbe`]
    /// for an unrecognized `probe_id`.
    pub async fn run_once(&self, probe_id: &ProbeId) -> Result<(), EngineError> {
        Ok(self.scheduler.run_once(probe_id).await?)
    }

    /// Arms `probe_id`'s timer. Idempotent.
    pub fn enable(&self, probe_id: &ProbeId) {
        self.scheduler.enable(probe_id);
    }

    /// Disarms `probe_id`'s timer. Idempotent.
    pub fn disable(&self, probe_id: &ProbeId) {
        self.scheduler.disable(probe_id);
    }

    /// Mutes `probe_id` for `minutes` from now.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scheduler`] with [`SchedulerError::UnknownProbe`]
    /// for an unrecognized `probe_id`, or on a store failure.
    pub async fn mute(&self, probe_id: &ProbeId, minutes: u32) -> Result<(), EngineError> {
        Ok(self.scheduler.mute(probe_id, minutes).await?)
    }

    /// Clears any active mute on `probe_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Scheduler`] with [`SchedulerError::UnknownProbe`]
    /// for an unrecognized `probe_id`, or on a store failure.
    pub async fn unmute(&self, probe_id: &ProbeId) -> Result<(), EngineError> {
        Ok(self.scheduler.unmute(probe_id).await?)
    }

    /// Shuts the engine down: cancels every probe timer, clears in-flight
    /// locks, and releases every platform's resources.
    pub async fn stop(&self) {
        self.scheduler.stop();
        self.registry.destroy_all().await;
    }

    /// Reports upstream health for every registered platform.
    #[must_use]
    pub async fn platform_health(&self) -> BTreeMap<monitord_core::identifiers::PlatformId, bool> {
        self.registry.health_status().await
    }
}

fn register_probe(registry: &PlatformRegistry, scheduler: &Scheduler, descriptor: &ProbeDescriptor) -> Result<(), EngineError> {
    let probe = registry.create_probe(&descriptor.platform, &descriptor.probe_type, descriptor)?;
    let rules = descriptor.rules.iter().map(build_rule).collect();
    scheduler.register(descriptor.clone(), probe, rules);
    Ok(())
}
