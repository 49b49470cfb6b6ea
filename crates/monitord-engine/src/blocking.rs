// crates/monitord-engine/src/blocking.rs
// ============================================================================
// Module: Blocking Store Bridge
// Description: Runs a synchronous StateStore call off the async executor.
// Purpose: `StateStore` is intentionally synchronous (it mirrors the
//          teacher's `RunStateStore`, backed by rusqlite); the scheduler and
//          pipeline are async, so every store call is bridged through
//          `spawn_blocking` rather than risking a blocked executor thread.
// Dependencies: tokio, monitord-core
// ============================================================================

use monitord_core::error::StoreError;

/// Runs `f` on a blocking-pool thread and flattens a task panic into a
/// [`StoreError::Io`].
pub async fn run_store<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join_err) => Err(StoreError::Io(format!("state store task panicked: {join_err}"))),
    }
}
