// crates/monitord-store-sqlite/src/lib.rs
// ============================================================================
// Crate: monitord-store-sqlite
// Description: Durable SQLite-backed implementation of
//              `monitord_core::traits::StateStore`.
// Purpose: Give the engine a single-file, zero-ops persistence backend for
//          probe/rule state, sent-alert dedup, cooldowns, and run history.
// ============================================================================

pub mod store;

pub use store::SqliteStateStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
