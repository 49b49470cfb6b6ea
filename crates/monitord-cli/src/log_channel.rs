// crates/monitord-cli/src/log_channel.rs
// ============================================================================
// Module: Log Channel
// Description: A delivery channel that renders alerts through `tracing`.
// Purpose: Give the binary a working channel out of the box, so `monitord
//          serve` has somewhere to deliver alerts without a real paging
//          integration configured.
// Dependencies: monitord-core, tracing
// ============================================================================

use async_trait::async_trait;
use monitord_core::alert::Alert;
use monitord_core::alert::Severity;
use monitord_core::error::ChannelError;
use monitord_core::traits::Channel;

/// Renders every alert as a structured `tracing` event at a level matching
/// its severity.
pub struct LogChannel;

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        match alert.severity {
            Severity::Critical => tracing::error!(probe_id = %alert.probe_id, rule_id = %alert.rule_id, alert_id = %alert.id, message = %alert.message, "alert"),
            Severity::Warning => tracing::warn!(probe_id = %alert.probe_id, rule_id = %alert.rule_id, alert_id = %alert.id, message = %alert.message, "alert"),
            Severity::Info => tracing::info!(probe_id = %alert.probe_id, rule_id = %alert.rule_id, alert_id = %alert.id, message = %alert.message, "alert"),
        }
        Ok(())
    }
}
