//! Chunk-seal fan-out
//!
//! A lossy wake signal shared by all stream subscribers. Publishing never
//! blocks the ingest worker: with no subscribers the signal is dropped, and
//! a subscriber that falls behind is lagged forward onto the newest signal
//! rather than buffering one wake per chunk.

use tokio::sync::broadcast;

/// Small on purpose: subscribers only need to learn "a new chunk exists",
/// so stale signals are worthless.
const SIGNAL_CAPACITY: usize = 16;

/// Fan-out of chunk-seal signals to downstream consumers.
#[derive(Debug, Clone)]
pub struct ChunkBroadcaster {
    tx: broadcast::Sender<u64>,
}

impl ChunkBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    /// Publish the sequence number of a freshly sealed chunk. Best-effort:
    /// with no subscriber the signal is dropped.
    pub fn notify(&self, seq: u64) {
        let _ = self.tx.send(seq);
    }

    /// Subscribe to seal signals. Signals published before the subscription
    /// are not observed.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.tx.subscribe()
    }

    /// Current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChunkBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
