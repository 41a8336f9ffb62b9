//! The counting engine
//!
//! Owns every piece of long-lived counting state: the sliding-window focus
//! counter, the long-horizon counter, the pending chunk, the ring of sealed
//! chunks, the message counter, the ranking cache, and the chunk-seal
//! broadcaster. Collaborators (ingest worker, ranker, HTTP handlers,
//! snapshot store) share one `Arc<Engine>`; there are no process-level
//! globals.
//!
//! Lock order: `focus` before `long`, always. The ring has its own lock,
//! touched only at seal time and by the latest-chunk endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{error, warn};

use crate::broadcast::ChunkBroadcaster;
use crate::config::CountingConfig;
use crate::diff::{Count, WordDiff};
use crate::ranker::RankedWord;
use crate::ring::ChunkRing;
use crate::snapshot::RecoveryPoint;
use crate::tokenizer::Tokenizer;

/// What one ingested message caused.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestOutcome {
    /// Valid words counted from the message
    pub words: usize,
    /// A chunk was sealed and enqueued
    pub sealed: bool,
    /// The long counter was pruned; a snapshot should be written now
    pub snapshot_due: bool,
}

/// Shared counting state with explicit lifecycle.
pub struct Engine {
    counting: CountingConfig,
    tokenizer: Tokenizer,
    /// Sliding-window counter: sum of the chunks in the ring plus the
    /// pending chunk
    focus: WordDiff,
    /// Cumulative counter across all messages ever ingested, minus pruned
    /// residue
    long: WordDiff,
    /// Contribution of the current, not yet sealed chunk
    pending: WordDiff,
    ring: Mutex<ChunkRing<Arc<WordDiff>>>,
    total_messages: AtomicU64,
    chunks_sealed: AtomicU64,
    /// Latest ranking pass output, ascending by score
    top: RwLock<Vec<RankedWord>>,
    /// Opaque word → translation passthrough; persisted with snapshots and
    /// read through by the HTTP surface
    translations: Mutex<HashMap<String, String>>,
    chunks: ChunkBroadcaster,
}

impl Engine {
    pub fn new(counting: CountingConfig, tokenizer: Tokenizer) -> Self {
        debug_assert!(counting.agg_size > 0 && counting.focus_period > 0);
        Self {
            ring: Mutex::new(ChunkRing::new(counting.focus_period)),
            counting,
            tokenizer,
            focus: WordDiff::new(),
            long: WordDiff::new(),
            pending: WordDiff::new(),
            total_messages: AtomicU64::new(0),
            chunks_sealed: AtomicU64::new(0),
            top: RwLock::new(Vec::new()),
            translations: Mutex::new(HashMap::new()),
            chunks: ChunkBroadcaster::new(),
        }
    }

    pub fn counting(&self) -> CountingConfig {
        self.counting
    }

    pub fn focus(&self) -> &WordDiff {
        &self.focus
    }

    pub fn long(&self) -> &WordDiff {
        &self.long
    }

    /// Messages ingested since the epoch of the last restore-free start.
    pub fn total_messages(&self) -> u64 {
        self.total_messages.load(Ordering::SeqCst)
    }

    /// Chunks sealed so far.
    pub fn chunks_sealed(&self) -> u64 {
        self.chunks_sealed.load(Ordering::SeqCst)
    }

    /// Fan-out of chunk-seal signals; subscribe here for wakes.
    pub fn broadcaster(&self) -> &ChunkBroadcaster {
        &self.chunks
    }

    /// The most recently sealed chunk, if any chunk was sealed yet.
    pub fn last_chunk(&self) -> Option<Arc<WordDiff>> {
        self.ring.lock().unwrap().last().cloned()
    }

    pub fn translation(&self, word: &str) -> Option<String> {
        self.translations.lock().unwrap().get(word).cloned()
    }

    /// Latest ranking output, ascending by score.
    pub fn top(&self) -> Vec<RankedWord> {
        self.top.read().unwrap().clone()
    }

    /// Publish a ranking pass result.
    pub fn set_top(&self, top: Vec<RankedWord>) {
        *self.top.write().unwrap() = top;
    }

    /// Ingest one message: count it, update all three counters, and run the
    /// periodic maintenance that falls on this message (prunes, chunk seal).
    pub fn ingest(&self, text: &str) -> IngestOutcome {
        let n = self.total_messages.fetch_add(1, Ordering::SeqCst) + 1;
        let words = self.tokenizer.tokenize(text);
        let mut outcome = IngestOutcome {
            words: words.len(),
            ..Default::default()
        };

        for word in &words {
            self.focus.inc(word);
            self.long.inc(word);
            self.pending.inc(word);
        }

        if n % self.counting.focus_prune_period == 0 {
            self.focus.prune(0);
        }
        if n % self.counting.long_prune_period == 0 {
            self.long.prune(1);
            outcome.snapshot_due = true;
        }
        if n % self.counting.agg_size == 0 {
            self.seal_pending();
            outcome.sealed = true;
        }

        outcome
    }

    /// Freeze the pending chunk, rotate it into the ring (evicting the
    /// oldest chunk from the window first when full), and signal
    /// subscribers.
    fn seal_pending(&self) {
        let chunk = Arc::new(WordDiff::from_counts(self.pending.take()));
        {
            let mut ring = self.ring.lock().unwrap();
            if ring.is_full() {
                match ring.dequeue() {
                    Some(oldest) => self.focus.sub(&oldest),
                    None => {
                        error!(
                            len = ring.len(),
                            capacity = ring.capacity(),
                            "chunk ring reported full but had nothing to evict"
                        );
                        panic!("chunk ring invariant violated");
                    }
                }
            }
            if !ring.enqueue(chunk) {
                error!(
                    len = ring.len(),
                    capacity = ring.capacity(),
                    "chunk ring rejected a chunk after eviction"
                );
                panic!("chunk ring invariant violated");
            }
        }
        let seq = self.chunks_sealed.fetch_add(1, Ordering::SeqCst) + 1;
        self.chunks.notify(seq);
    }

    /// Export all persistent state. Called from the ingest task between
    /// messages, so no counter is mid-update.
    pub fn recovery_point(&self) -> RecoveryPoint {
        let ring = self.ring.lock().unwrap();
        RecoveryPoint {
            total_messages: self.total_messages(),
            agg_size: self.counting.agg_size,
            focus_period: self.counting.focus_period,
            long: self.long.counts(),
            focus: self.focus.counts(),
            chunks: ring.iter().map(|chunk| chunk.counts()).collect(),
            translations: self.translations.lock().unwrap().clone(),
        }
    }

    /// Overwrite all runtime state from a recovery point. Must run before
    /// the workers start; the restored tunables replace the configured ones
    /// so the ring geometry matches the snapshot.
    pub fn install(&mut self, point: RecoveryPoint) {
        self.counting.agg_size = point.agg_size.max(1);
        self.counting.focus_period = point.focus_period.max(1);

        let mut ring = ChunkRing::new(self.counting.focus_period);
        let mut dropped = 0usize;
        for chunk in point.chunks {
            if ring.is_full() {
                ring.dequeue();
                dropped += 1;
            }
            ring.enqueue(Arc::new(WordDiff::from_counts(chunk)));
        }
        if dropped > 0 {
            warn!(dropped, "recovery point held more chunks than the ring; oldest dropped");
        }

        self.ring = Mutex::new(ring);
        self.focus = WordDiff::from_counts(point.focus);
        self.long = WordDiff::from_counts(point.long);
        self.pending = WordDiff::new();
        self.total_messages = AtomicU64::new(point.total_messages);
        self.chunks_sealed = AtomicU64::new(point.total_messages / self.counting.agg_size);
        self.translations = Mutex::new(point.translations);
    }

    /// Pending-chunk counts, for window-invariant checks.
    pub fn pending_counts(&self) -> HashMap<String, Count> {
        self.pending.counts()
    }
}
