// crates/monitord-core/src/identifiers.rs
// ============================================================================
// Module: Engine Identifiers
// Description: Canonical opaque identifiers for probes, rules, and platforms.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! Identifiers are opaque, non-empty, owned strings. They serialize
//! transparently so descriptors and persisted records round-trip without a
//! wrapper layer on the wire.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Identifier for a probe descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbeId(String);

/// Identifier for a rule descriptor, scoped within its owning probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

/// Identifier for a registered platform plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformId(String);

macro_rules! opaque_id {
    ($ty:ident) => {
        impl $ty {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true when the identifier is empty.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(ProbeId);
opaque_id!(RuleId);
opaque_id!(PlatformId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_inner_string() {
        let id = ProbeId::new("evm-mainnet-gas");
        assert_eq!(id.to_string(), "evm-mainnet-gas");
        assert_eq!(id.as_str(), "evm-mainnet-gas");
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut ids = vec![ProbeId::new("b"), ProbeId::new("a"), ProbeId::new("c")];
        ids.sort();
        assert_eq!(ids, vec![ProbeId::new("a"), ProbeId::new("b"), ProbeId::new("c")]);
    }
}
