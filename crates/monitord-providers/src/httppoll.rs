// crates/monitord-providers/src/httppoll.rs
// ============================================================================
// Module: httppoll Platform
// Description: A JSONPath-driven HTTP polling platform and its single probe
//              type, `json_poll`.
// Purpose: Demonstrate the Platform/Probe contracts end to end against a
//          real upstream, wrapped in a per-probe circuit breaker and
//          optional rate limiter.
// Dependencies: monitord-core, monitord-resilience, reqwest, jsonpath_lib
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use monitord_core::descriptor::PlatformDescriptor;
use monitord_core::descriptor::ProbeDescriptor;
use monitord_core::error::PlatformError;
use monitord_core::error::ProbeError;
use monitord_core::facts::FactValue;
use monitord_core::facts::Facts;
use monitord_core::identifiers::PlatformId;
use monitord_core::identifiers::ProbeId;
use monitord_core::state::ProbeState;
use monitord_core::time::Clock;
use monitord_core::traits::Platform;
use monitord_core::traits::Probe;
use monitord_resilience::CircuitBreaker;
use monitord_resilience::CircuitBreakerConfig;
use monitord_resilience::CircuitCallError;
use monitord_resilience::RateLimiter;
use monitord_resilience::RateLimiterConfig;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const PROBE_TYPE_JSON_POLL: &str = "json_poll";

/// Per-probe configuration for the `json_poll` probe type.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonPollConfig {
    /// Fully qualified URL to poll.
    pub url: String,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Fact key -> JSONPath expression evaluated against the response body.
    pub jsonpath_mappings: BTreeMap<String, String>,
    /// Consecutive failures before the breaker trips open.
    #[serde(default = "default_failure_threshold")]
    pub circuit_failure_threshold: u32,
    /// Milliseconds the breaker stays open before a trial call.
    #[serde(default = "default_reset_timeout_ms")]
    pub circuit_reset_timeout_ms: u64,
    /// Maximum requests per rolling rate-limit window; `None` disables limiting.
    #[serde(default)]
    pub rate_limit_max_requests: Option<usize>,
    /// Rolling rate-limit window, in milliseconds.
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_reset_timeout_ms() -> u64 {
    30_000
}

const fn default_rate_limit_window_ms() -> u64 {
    1_000
}

/// Errors from an HTTP poll request, wrapped by the probe's circuit breaker.
#[derive(Debug, Error)]
pub enum HttpPollError {
    /// The request itself failed (DNS, connect, TLS, timeout).
    #[error("request failed: {0}")]
    Request(String),
    /// The upstream responded with a non-2xx status.
    #[error("upstream returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// The response body was not valid JSON.
    #[error("response body was not valid json: {0}")]
    InvalidJson(String),
}

/// The `httppoll` platform: one HTTP client shared by every `json_poll`
/// probe it mints, each with its own circuit breaker and optional limiter.
pub struct HttpPollPlatform {
    descriptor: PlatformDescriptor,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    breakers: Mutex<BTreeMap<ProbeId, Arc<CircuitBreaker>>>,
}

impl HttpPollPlatform {
    /// Builds the platform with a fresh HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InitializationFailed`] if the HTTP client
    /// cannot be constructed.
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder().build().map_err(|err| PlatformError::InitializationFailed { platform: "httppoll".to_string(), reason: err.to_string() })?;
        Ok(Self {
            descriptor: PlatformDescriptor { id: PlatformId::new("httppoll"), display_name: "HTTP Poll".to_string(), version: env!("CARGO_PKG_VERSION").to_string(), supported_probe_types: [PROBE_TYPE_JSON_POLL.to_string()].into_iter().collect() },
            client,
            clock,
            breakers: Mutex::new(BTreeMap::new()),
        })
    }

    fn breaker_for(&self, probe_id: &ProbeId, config: &JsonPollConfig) -> Arc<CircuitBreaker> {
        #[allow(clippy::unwrap_used)]
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(probe_id.clone())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    probe_id.to_string(),
                    CircuitBreakerConfig { failure_threshold: config.circuit_failure_threshold, reset_timeout: Duration::from_millis(config.circuit_reset_timeout_ms), half_open_max_attempts: 1 },
                    Arc::clone(&self.clock),
                ))
            })
            .clone()
    }
}

#[async_trait]
impl Platform for HttpPollPlatform {
    fn describe(&self) -> &PlatformDescriptor {
        &self.descriptor
    }

    async fn initialize(&self, _config: Value) -> Result<(), PlatformError> {
        Ok(())
    }

    fn create_probe(&self, probe_type: &str, descriptor: &ProbeDescriptor) -> Result<Arc<dyn Probe>, PlatformError> {
        if probe_type != PROBE_TYPE_JSON_POLL {
            return Err(PlatformError::UnsupportedProbeType { platform: self.descriptor.id.to_string(), probe_type: probe_type.to_string(), supported: PROBE_TYPE_JSON_POLL.to_string() });
        }
        let config: JsonPollConfig = serde_json::from_value(descriptor.config.clone()).map_err(|err| PlatformError::ProbeCreationFailed { platform: self.descriptor.id.to_string(), reason: err.to_string() })?;
        let breaker = self.breaker_for(&descriptor.id, &config);
        let limiter = config.rate_limit_max_requests.map(|max_requests| Arc::new(RateLimiter::new(RateLimiterConfig { max_requests, window: Duration::from_millis(config.rate_limit_window_ms) }, Arc::clone(&self.clock))));
        Ok(Arc::new(JsonPollProbe { client: self.client.clone(), config, breaker, limiter }))
    }

    async fn destroy(&self) {
        #[allow(clippy::unwrap_used)]
        self.breakers.lock().unwrap().clear();
    }

    async fn health_check(&self) -> bool {
        #[allow(clippy::unwrap_used)]
        let breakers = self.breakers.lock().unwrap();
        !breakers.values().any(|breaker| breaker.metrics().state == monitord_resilience::CircuitState::Open)
    }
}

/// Polls a JSON endpoint and extracts facts via JSONPath.
pub struct JsonPollProbe {
    client: reqwest::Client,
    config: JsonPollConfig,
    breaker: Arc<CircuitBreaker>,
    limiter: Option<Arc<RateLimiter>>,
}

impl JsonPollProbe {
    async fn fetch(&self) -> Result<Value, HttpPollError> {
        let mut request = self.client.get(&self.config.url);
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }
        let response = request.send().await.map_err(|err| HttpPollError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpPollError::Status { status: status.as_u16() });
        }
        response.json::<Value>().await.map_err(|err| HttpPollError::InvalidJson(err.to_string()))
    }

    fn extract_facts(&self, body: &Value) -> Facts {
        let mut facts = Facts::new();
        for (fact_key, path) in &self.config.jsonpath_mappings {
            let value = jsonpath_lib::select(body, path).ok().and_then(|matches| matches.into_iter().next()).map_or(FactValue::Null, json_to_fact_value);
            facts.insert(fact_key.clone(), value);
        }
        facts
    }
}

fn json_to_fact_value(value: &Value) -> FactValue {
    match value {
        Value::Null => FactValue::Null,
        Value::Bool(flag) => FactValue::Bool(*flag),
        Value::Number(number) => number.as_i64().map_or_else(|| number.as_f64().map_or(FactValue::Null, FactValue::Float), FactValue::Int),
        Value::String(text) => FactValue::String(text.clone()),
        Value::Array(_) | Value::Object(_) => FactValue::String(value.to_string()),
    }
}

#[async_trait]
impl Probe for JsonPollProbe {
    async fn collect(&self, _state: &mut ProbeState) -> Result<Facts, ProbeError> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        match self.breaker.call(|| self.fetch()).await {
            Ok(body) => Ok(self.extract_facts(&body)),
            Err(CircuitCallError::Open(open)) => Err(ProbeError::UpstreamUnavailable(open.to_string())),
            Err(CircuitCallError::Inner(err)) => Err(ProbeError::CollectionFailed(err.to_string())),
        }
    }
}
