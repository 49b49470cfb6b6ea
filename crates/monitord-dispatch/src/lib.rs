// crates/monitord-dispatch/src/lib.rs
// ============================================================================
// Crate: monitord-dispatch
// Description: Platform registry and alert channel fan-out.
// Purpose: Give the engine a single place to resolve platforms by id and
//          deliver alerts to every configured channel.
// ============================================================================

pub mod channel_set;
pub mod registry;

pub use channel_set::ChannelOutcome;
pub use channel_set::ChannelSet;
pub use registry::DispatchError;
pub use registry::PlatformRegistry;
