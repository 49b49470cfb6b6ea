// crates/monitord-config/src/config.rs
// ============================================================================
// Module: Configuration Loader
// Description: The validated configuration record and its strict TOML
//              loader.
// Purpose: Parse a configuration file the same way every time, rejecting
//          unknown fields and structurally invalid descriptors, without
//          attempting the richer semantic validation an external config
//          service would own.
// Dependencies: serde, toml, monitord-core, monitord-store-sqlite
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use monitord_core::descriptor::ProbeDescriptor;
use monitord_core::identifiers::PlatformId;
use monitord_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Longest accepted configuration file path, in bytes.
const MAX_PATH_LEN: usize = 4_096;
/// Longest accepted single path component, in bytes.
const MAX_PATH_COMPONENT_LEN: usize = 255;
/// Largest accepted configuration file size, in bytes.
const MAX_FILE_BYTES: u64 = 1_048_576;
/// Default cooldown window between two deliveries of the same
/// `(probeId, ruleId)` pair, per §4.1.
const DEFAULT_COOLDOWN_SECONDS: u64 = 900;

/// Errors from loading or structurally validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration path exceeds [`MAX_PATH_LEN`].
    #[error("config path exceeds max length of {MAX_PATH_LEN} bytes")]
    PathTooLong,
    /// A single path component exceeds [`MAX_PATH_COMPONENT_LEN`].
    #[error("config path component too long (max {MAX_PATH_COMPONENT_LEN} bytes)")]
    PathComponentTooLong,
    /// The configuration file exceeds [`MAX_FILE_BYTES`].
    #[error("config file exceeds size limit of {MAX_FILE_BYTES} bytes")]
    FileTooLarge,
    /// The configuration file is not UTF-8.
    #[error("config file must be utf-8: {0}")]
    NotUtf8(String),
    /// The file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The file's contents did not parse as valid TOML matching the schema.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Two probes in the same file share an `id`.
    #[error("duplicate probe id '{id}'")]
    DuplicateProbeId {
        /// The repeated probe identifier.
        id: String,
    },
    /// Two rules of the same probe share an `id`.
    #[error("probe '{probe}' has duplicate rule id '{rule}'")]
    DuplicateRuleId {
        /// Owning probe identifier.
        probe: String,
        /// The repeated rule identifier.
        rule: String,
    },
    /// A probe's `interval` was not a positive number of seconds.
    #[error("probe '{probe}' has non-positive interval")]
    NonPositiveInterval {
        /// Offending probe identifier.
        probe: String,
    },
    /// A probe's `timeout` was not a positive number of milliseconds.
    #[error("probe '{probe}' has non-positive timeout")]
    NonPositiveTimeout {
        /// Offending probe identifier.
        probe: String,
    },
}

/// One entry of the `platforms` table: which platform to initialize, with
/// what config bag, and whether it is enabled at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfigEntry {
    /// Platform identifier, matched against a registered [`monitord_core::traits::Platform`].
    pub platform: PlatformId,
    /// Whether this platform is initialized at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Platform-specific initialization config bag.
    #[serde(default)]
    pub config: Value,
}

const fn default_enabled() -> bool {
    true
}

const fn default_cooldown_seconds() -> u64 {
    DEFAULT_COOLDOWN_SECONDS
}

/// The validated configuration record the engine consumes, per §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Platforms to initialize at startup.
    #[serde(default)]
    pub platforms: Vec<PlatformConfigEntry>,
    /// Probes to schedule.
    pub probes: Vec<ProbeDescriptor>,
    /// Durable state store configuration.
    pub store: SqliteStoreConfig,
    /// Dedup TTL, in seconds; `None` means permanent dedup until operator
    /// cleanup, resolving the "sometimes passed, sometimes omitted" open
    /// question in favor of an explicit, configurable policy.
    #[serde(default)]
    pub dedup_ttl_seconds: Option<u64>,
    /// Cooldown window between two deliveries of the same
    /// `(probeId, ruleId)` pair, in seconds.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_window_seconds: u64,
}

impl EngineConfig {
    /// Performs structural validation: unique probe/rule ids and positive
    /// interval/timeout. Does not validate that referenced platforms exist
    /// or that probe `config` bags match their platform's expectations —
    /// those are runtime concerns of the registry and platform themselves.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut probe_ids = BTreeSet::new();
        for probe in &self.probes {
            if !probe_ids.insert(probe.id.as_str()) {
                return Err(ConfigError::DuplicateProbeId { id: probe.id.to_string() });
            }
            if probe.interval == 0 {
                return Err(ConfigError::NonPositiveInterval { probe: probe.id.to_string() });
            }
            if probe.timeout == 0 {
                return Err(ConfigError::NonPositiveTimeout { probe: probe.id.to_string() });
            }
            let mut rule_ids = BTreeSet::new();
            for rule in &probe.rules {
                if !rule_ids.insert(rule.id.as_str()) {
                    return Err(ConfigError::DuplicateRuleId { probe: probe.id.to_string(), rule: rule.id.to_string() });
                }
            }
        }
        Ok(())
    }
}

fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let path_str = path.to_string_lossy();
    if path_str.len() > MAX_PATH_LEN {
        return Err(ConfigError::PathTooLong);
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LEN {
            return Err(ConfigError::PathComponentTooLong);
        }
    }
    Ok(())
}

/// Loads and structurally validates a configuration file from `path`.
///
/// # Errors
///
/// Returns [`ConfigError`] on any I/O, size, encoding, parse, or structural
/// validation failure.
pub fn load_from_path(path: &Path) -> Result<EngineConfig, ConfigError> {
    validate_path(path)?;

    let metadata = fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if metadata.len() > MAX_FILE_BYTES {
        return Err(ConfigError::FileTooLarge);
    }

    let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|err| ConfigError::NotUtf8(err.to_string()))?;

    let config: EngineConfig = toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("creates temp file");
        file.write_all(contents.as_bytes()).expect("writes temp file");
        file
    }

    const MINIMAL: &str = r#"
        [store]
        path = "/tmp/monitord.sqlite"

        [[probes]]
        id = "p1"
        platform = "httppoll"
        type = "json_poll"
        interval = 60
        config = { url = "https://example.invalid/status" }
    "#;

    #[test]
    fn loads_a_minimal_valid_config() {
        let file = write_config(MINIMAL);
        let config = load_from_path(file.path()).expect("loads");
        assert_eq!(config.probes.len(), 1);
        assert_eq!(config.cooldown_window_seconds, DEFAULT_COOLDOWN_SECONDS);
        assert_eq!(config.dedup_ttl_seconds, None);
    }

    #[test]
    fn rejects_unknown_top_level_fields() {
        let file = write_config(&format!("{MINIMAL}\nbogus = true\n"));
        let err = load_from_path(file.path()).expect_err("unknown field rejected");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_duplicate_probe_ids() {
        let doubled = format!(
            r#"
            [store]
            path = "/tmp/monitord.sqlite"

            [[probes]]
            id = "p1"
            platform = "httppoll"
            type = "json_poll"
            interval = 60
            config = {{ url = "https://example.invalid/a" }}

            [[probes]]
            id = "p1"
            platform = "httppoll"
            type = "json_poll"
            interval = 60
            config = {{ url = "https://example.invalid/b" }}
            "#
        );
        let file = write_config(&doubled);
        let err = load_from_path(file.path()).expect_err("duplicate rejected");
        assert!(matches!(err, ConfigError::DuplicateProbeId { .. }));
    }

    #[test]
    fn rejects_zero_interval() {
        let file = write_config(
            r#"
            [store]
            path = "/tmp/monitord.sqlite"

            [[probes]]
            id = "p1"
            platform = "httppoll"
            type = "json_poll"
            interval = 0
            config = { url = "https://example.invalid/status" }
            "#,
        );
        let err = load_from_path(file.path()).expect_err("zero interval rejected");
        assert!(matches!(err, ConfigError::NonPositiveInterval { .. }));
    }

    #[test]
    fn rejects_oversized_file() {
        let file = write_config(&"a".repeat(MAX_FILE_BYTES as usize + 1));
        let err = load_from_path(file.path()).expect_err("oversized file rejected");
        assert!(matches!(err, ConfigError::FileTooLarge));
    }

    #[test]
    fn rejects_non_utf8_file() {
        let mut file = NamedTempFile::new().expect("creates temp file");
        file.write_all(&[0xFF, 0xFE, 0xFF]).expect("writes temp file");
        let err = load_from_path(file.path()).expect_err("non-utf8 rejected");
        assert!(matches!(err, ConfigError::NotUtf8(_)));
    }
}
