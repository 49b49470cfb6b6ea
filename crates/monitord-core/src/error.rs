// crates/monitord-core/src/error.rs
// ============================================================================
// Module: Engine Error Taxonomy
// Description: Per-contract error types, rising in severity per §7.
// Purpose: Give each plugin contract (Probe, Rule, Platform, Channel,
//          StateStore) its own narrow, programmatically matchable error
//          type instead of one catch-all enum for the whole engine.
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Errors a [`crate::traits::Probe`] may return from `collect`.
///
/// A probe should never return an error for a recoverable upstream issue —
/// it should instead record a null-valued fact. It returns an error only for
/// conditions the scheduler should record as a run-level failure.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The upstream is unreachable: the circuit breaker is open, or the
    /// call timed out, and the probe could not produce any useful facts.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// The probe failed for a reason not covered by the other variants.
    #[error("probe collection failed: {0}")]
    CollectionFailed(String),
}

/// Errors a [`crate::traits::Rule`] may return from `evaluate`.
///
/// Per §4.6 step 6, a rule that returns this is logged and skipped; other
/// rules in the same run still execute.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule's own persisted continuity state failed to decode.
    #[error("rule state decode failed: {0}")]
    StateDecode(String),
    /// The rule failed for a reason not covered by the other variants.
    #[error("rule evaluation failed: {0}")]
    EvaluationFailed(String),
}

/// Errors a [`crate::traits::Platform`] may return from lifecycle methods.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// `create_probe` was asked for a `type` outside `supported_probe_types`.
    #[error("platform '{platform}' does not support probe type '{probe_type}' (supported: {supported})")]
    UnsupportedProbeType {
        /// Platform identifier.
        platform: String,
        /// Requested, unsupported probe type.
        probe_type: String,
        /// Comma-joined list of supported probe types.
        supported: String,
    },
    /// `initialize` failed; fatal at startup, names the platform.
    #[error("platform '{platform}' failed to initialize: {reason}")]
    InitializationFailed {
        /// Platform identifier.
        platform: String,
        /// Underlying failure reason.
        reason: String,
    },
    /// `create_probe` failed for a reason other than an unsupported type.
    #[error("platform '{platform}' could not create probe: {reason}")]
    ProbeCreationFailed {
        /// Platform identifier.
        platform: String,
        /// Underlying failure reason.
        reason: String,
    },
}

/// Errors a [`crate::traits::Channel`] may return from `send`.
///
/// Per §4.7 stage 4, channel errors are logged and isolated; they never
/// abort the fan-out or affect dedup/cooldown recording.
#[derive(Debug, Error)]
#[error("channel delivery failed: {0}")]
pub struct ChannelError(pub String);

/// Errors the durable [`crate::traits::StateStore`] may return.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store's backing I/O failed.
    #[error("state store io error: {0}")]
    Io(String),
    /// Persisted data failed to decode.
    #[error("state store decode error: {0}")]
    Decode(String),
}
