// crates/monitord-dispatch/src/registry.rs
// ============================================================================
// Module: Platform Registry
// Description: Registry of platform plugins, keyed by platform identifier.
// Purpose: Resolve a platform by id, drive its lifecycle, and mint probes
//          through it.
// Dependencies: monitord-core, futures
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use monitord_core::descriptor::ProbeDescriptor;
use monitord_core::error::PlatformError;
use monitord_core::identifiers::PlatformId;
use monitord_core::traits::Platform;
use monitord_core::traits::Probe;
use serde_json::Value;
use thiserror::Error;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `register` was called with an id already present.
    #[error("platform '{id}' is already registered")]
    DuplicatePlatform {
        /// The conflicting platform identifier.
        id: String,
    },
    /// A lookup referenced a platform id with no registered platform.
    #[error("platform '{id}' is not registered")]
    UnknownPlatform {
        /// The missing platform identifier.
        id: String,
    },
    /// The underlying platform call failed.
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Registry of platform plugins.
///
/// # Invariants
/// - Platform identifiers are unique within the registry.
pub struct PlatformRegistry {
    platforms: BTreeMap<PlatformId, Arc<dyn Platform>>,
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { platforms: BTreeMap::new() }
    }

    /// Registers `platform` under its own [`monitord_core::descriptor::PlatformDescriptor::id`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicatePlatform`] when the id is already
    /// registered.
    pub fn register(&mut self, platform: Arc<dyn Platform>) -> Result<(), DispatchError> {
        let id = platform.describe().id.clone();
        if self.platforms.contains_key(&id) {
            return Err(DispatchError::DuplicatePlatform { id: id.to_string() });
        }
        self.platforms.insert(id, platform);
        Ok(())
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn has(&self, id: &PlatformId) -> bool {
        self.platforms.contains_key(id)
    }

    /// Returns the platform registered under `id`, if any.
    #[must_use]
    pub fn get(&self, id: &PlatformId) -> Option<Arc<dyn Platform>> {
        self.platforms.get(id).cloned()
    }

    /// Returns every registered platform, in id order.
    #[must_use]
    pub fn get_all(&self) -> Vec<Arc<dyn Platform>> {
        self.platforms.values().cloned().collect()
    }

    /// Mints a probe from `platform_id`, delegating validation of
    /// `probe_type` to the platform itself.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownPlatform`] when `platform_id` is not
    /// registered, or [`DispatchError::Platform`] when the platform itself
    /// rejects the request.
    pub fn create_probe(&self, platform_id: &PlatformId, probe_type: &str, descriptor: &ProbeDescriptor) -> Result<Arc<dyn Probe>, DispatchError> {
        let platform = self.get(platform_id).ok_or_else(|| DispatchError::UnknownPlatform { id: platform_id.to_string() })?;
        platform.create_probe(probe_type, descriptor).map_err(DispatchError::Platform)
    }

    /// Initializes every registered platform in registration order, with
    /// each platform's own config bag looked up by id.
    ///
    /// # Errors
    ///
    /// Returns the first [`PlatformError`] encountered, naming the platform
    /// that failed; startup aborts at that point without initializing the
    /// remaining platforms.
    pub async fn initialize_all(&self, configs: &BTreeMap<PlatformId, Value>) -> Result<(), PlatformError> {
        for (id, platform) in &self.platforms {
            let config = configs.get(id).cloned().unwrap_or(Value::Null);
            platform.initialize(config).await?;
        }
        Ok(())
    }

    /// Releases every registered platform concurrently. Platform `destroy`
    /// cannot fail by contract; this only waits for completion.
    pub async fn destroy_all(&self) {
        let futures = self.platforms.values().map(|platform| platform.destroy());
        join_all(futures).await;
    }

    /// Reports upstream health for every registered platform concurrently.
    #[must_use]
    pub async fn health_status(&self) -> BTreeMap<PlatformId, bool> {
        let ids: Vec<_> = self.platforms.keys().cloned().collect();
        let checks = self.platforms.values().map(|platform| platform.health_check());
        let results = join_all(checks).await;
        ids.into_iter().zip(results).collect()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use monitord_core::descriptor::PlatformDescriptor;
    use monitord_core::error::ProbeError;
    use monitord_core::facts::Facts;
    use monitord_core::state::ProbeState;

    use super::*;

    struct StubPlatform {
        descriptor: PlatformDescriptor,
        healthy: bool,
    }

    struct StubProbe;

    #[async_trait]
    impl Probe for StubProbe {
        async fn collect(&self, _state: &mut ProbeState) -> Result<Facts, ProbeError> {
            Ok(Facts::new())
        }
    }

    #[async_trait]
    impl Platform for StubPlatform {
        fn describe(&self) -> &PlatformDescriptor {
            &self.descriptor
        }

        async fn initialize(&self, _config: Value) -> Result<(), PlatformError> {
            Ok(())
        }

        fn create_probe(&self, probe_type: &str, _descriptor: &ProbeDescriptor) -> Result<Arc<dyn Probe>, PlatformError> {
            if probe_type == "known" {
                Ok(Arc::new(StubProbe))
            } else {
                Err(PlatformError::UnsupportedProbeType { platform: self.descriptor.id.to_string(), probe_type: probe_type.to_string(), supported: "known".to_string() })
            }
        }

        async fn destroy(&self) {}

        async fn health_check(&self) -> bool {
            self.healthy
        }
    }

    fn stub(id: &str, healthy: bool) -> Arc<dyn Platform> {
        Arc::new(StubPlatform {
            descriptor: PlatformDescriptor { id: PlatformId::new(id), display_name: id.to_string(), version: "0.0.0".to_string(), supported_probe_types: ["known".to_string()].into_iter().collect() },
            healthy,
        })
    }

    #[test]
    fn register_rejects_duplicate_ids() {
        let mut registry = PlatformRegistry::new();
        registry.register(stub("p1", true)).expect("first registers");
        let err = registry.register(stub("p1", true)).expect_err("duplicate rejected");
        assert!(matches!(err, DispatchError::DuplicatePlatform { .. }));
    }

    #[tokio::test]
    async fn health_status_reports_every_registered_platform() {
        let mut registry = PlatformRegistry::new();
        registry.register(stub("healthy", true)).expect("registers");
        registry.register(stub("unhealthy", false)).expect("registers");

        let status = registry.health_status().await;
        assert_eq!(status.get(&PlatformId::new("healthy")), Some(&true));
        assert_eq!(status.get(&PlatformId::new("unhealthy")), Some(&false));
    }

    #[test]
    fn create_probe_surfaces_unknown_platform() {
        let registry = PlatformRegistry::new();
        let descriptor = ProbeDescriptor { id: monitord_core::identifiers::ProbeId::new("probe"), platform: PlatformId::new("missing"), probe_type: "known".to_string(), enabled: true, interval: 60, timeout: 1_000, config: Value::Null, rules: Vec::new() };
        let err = registry.create_probe(&PlatformId::new("missing"), "known", &descriptor).expect_err("unknown platform rejected");
        assert!(matches!(err, DispatchError::UnknownPlatform { .. }));
    }
}
