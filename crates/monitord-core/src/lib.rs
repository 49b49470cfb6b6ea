// crates/monitord-core/src/lib.rs
// ============================================================================
// Crate: monitord-core
// Description: Shared types and plugin contracts for the monitoring engine —
//              identifiers, facts, alerts, probe/rule state, descriptors,
//              errors, the closed rule-kind set, and the five trait seams
//              (Probe, Rule, Platform, Channel, StateStore).
// Purpose: Give every other monitord-* crate a single, dependency-light
//          vocabulary to build against.
// ============================================================================

pub mod alert;
pub mod descriptor;
pub mod error;
pub mod facts;
pub mod identifiers;
pub mod rule_kinds;
pub mod state;
pub mod time;
pub mod traits;

pub use alert::Alert;
pub use alert::Link;
pub use alert::Severity;
pub use alert::breach_id;
pub use alert::change_id;
pub use alert::hash8;
pub use alert::render_template;
pub use alert::stuck_id;
pub use descriptor::DEFAULT_TIMEOUT_MS;
pub use descriptor::DescriptorSeverity;
pub use descriptor::Operator;
pub use descriptor::PlatformDescriptor;
pub use descriptor::ProbeDescriptor;
pub use descriptor::RuleDescriptor;
pub use descriptor::RuleKind;
pub use error::ChannelError;
pub use error::PlatformError;
pub use error::ProbeError;
pub use error::RuleError;
pub use error::StoreError;
pub use facts::FactValue;
pub use facts::Facts;
pub use facts::validate_fact_key;
pub use identifiers::PlatformId;
pub use identifiers::ProbeId;
pub use identifiers::RuleId;
pub use rule_kinds::ChangeRule;
pub use rule_kinds::ThresholdRule;
pub use rule_kinds::build_rule;
pub use state::DedupRecord;
pub use state::ProbeState;
pub use state::RunRecord;
pub use state::RunStatus;
pub use time::Clock;
pub use time::MillisSinceEpoch;
pub use time::SystemClock;
pub use time::system_clock;
pub use time::testing;
pub use traits::Channel;
pub use traits::Platform;
pub use traits::Probe;
pub use traits::Rule;
pub use traits::RuleContext;
pub use traits::StateStore;
