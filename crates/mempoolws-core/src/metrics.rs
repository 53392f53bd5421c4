//! Counters describing feed activity.

use serde::Serialize;

/// Metrics snapshot for one feed client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedMetrics {
    pub frames_received: u64,
    /// Frames that produced no event (unknown fields only, or not JSON).
    pub frames_ignored: u64,
    pub blocks_emitted: u64,
    pub stale_blocks_dropped: u64,
    pub confirmations: u64,
    pub transport_failures: u64,
    pub replays: u64,
    /// Intents issued while a retry delay was pending.
    pub intents_dropped: u64,
    pub reloads_scheduled: u64,
}
