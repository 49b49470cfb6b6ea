// crates/monitord-dispatch/src/channel_set.rs
// ============================================================================
// Module: Channel Fan-Out
// Description: Ordered collection of delivery channels with per-channel
//              error isolation.
// Purpose: Deliver one alert to every configured channel concurrently
//          without letting one channel's failure affect the others or the
//          pipeline's dedup/cooldown bookkeeping.
// Dependencies: monitord-core, futures, tracing
// ============================================================================

use std::sync::Arc;

use futures::future::join_all;
use monitord_core::alert::Alert;
use monitord_core::error::ChannelError;
use monitord_core::traits::Channel;

/// Outcome of delivering one alert to one channel.
#[derive(Debug)]
pub struct ChannelOutcome {
    /// Name of the channel that was invoked.
    pub channel: String,
    /// `Err` when delivery failed; never aborts the fan-out.
    pub result: Result<(), ChannelError>,
}

/// An ordered set of delivery channels invoked together for each alert.
pub struct ChannelSet {
    channels: Vec<Arc<dyn Channel>>,
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSet {
    /// Creates an empty channel set.
    #[must_use]
    pub fn new() -> Self {
        Self { channels: Vec::new() }
    }

    /// Appends a channel to the fan-out order.
    pub fn add(&mut self, channel: Arc<dyn Channel>) {
        self.channels.push(channel);
    }

    /// Returns the configured channels, in fan-out order.
    #[must_use]
    pub fn channels(&self) -> &[Arc<dyn Channel>] {
        &self.channels
    }

    /// Delivers `alert` to every channel concurrently.
    ///
    /// Never returns an error itself: a failing channel's outcome is
    /// reported in the returned list and logged, and does not affect
    /// delivery to the remaining channels.
    pub async fn dispatch(&self, alert: &Alert) -> Vec<ChannelOutcome> {
        let sends = self.channels.iter().map(|channel| async move {
            let result = channel.send(alert).await;
            if let Err(ref err) = result {
                tracing::warn!(channel = channel.name(), alert_id = %alert.id, error = %err, "channel delivery failed");
            }
            ChannelOutcome { channel: channel.name().to_string(), result }
        });
        join_all(sends).await
    }
}
