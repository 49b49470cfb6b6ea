// crates/monitord-config/src/lib.rs
// ============================================================================
// Crate: monitord-config
// Description: The validated configuration record the engine consumes, and
//              a strict TOML loader for it.
// Purpose: Own the Rust types describing a valid configuration, since
//          nothing downstream can define that shape; perform only
//          structural validation, not the richer semantic validation a real
//          external config service would own.
// ============================================================================

pub mod config;

pub use config::load_from_path;
pub use config::ConfigError;
pub use config::EngineConfig;
pub use config::PlatformConfigEntry;
