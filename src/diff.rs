//! Word-count diffs
//!
//! A `WordDiff` is a mutable associative counter mapping each word to a
//! signed count. It backs all three counting roles in the engine: the pending
//! per-chunk diff, the sliding-window focus counter, and the long-horizon
//! counter. Sealed chunks are `WordDiff`s that are never mutated again.
//!
//! All mutation happens under the diff's own lock. Two-diff operations
//! (`add`/`sub`) acquire `self` before `other`; callers guarantee the two
//! arguments are distinct diffs, which keeps the acquisition order total.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::codec;
use crate::error::Result;

/// Signed word count. Per-chunk counts stay small, but the long-horizon
/// counter accumulates for the lifetime of the deployment, so 64 bits
/// everywhere keeps the arithmetic uniform.
pub type Count = i64;

/// Word → signed count behind an exclusive lock.
#[derive(Debug, Default)]
pub struct WordDiff {
    words: Mutex<HashMap<String, Count>>,
}

impl WordDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a diff from an existing count table (snapshot restore, decode).
    pub fn from_counts(counts: HashMap<String, Count>) -> Self {
        Self {
            words: Mutex::new(counts),
        }
    }

    /// Acquire the lock, returning a guard that exposes the lock-held
    /// operations. The ranker holds guards on both counters for the duration
    /// of a pass so it observes one consistent snapshot.
    pub fn lock(&self) -> DiffGuard<'_> {
        DiffGuard {
            words: self.words.lock().unwrap(),
        }
    }

    /// Increment `word`: the count becomes `max(0, current) + 1`, so a word
    /// that went transiently negative restarts from one.
    pub fn inc(&self, word: &str) {
        let mut words = self.words.lock().unwrap();
        match words.get_mut(word) {
            Some(count) => *count = (*count).max(0) + 1,
            None => {
                words.insert(word.to_owned(), 1);
            }
        }
    }

    /// Current count for `word`, zero when absent.
    pub fn get(&self, word: &str) -> Count {
        self.lock().get(word)
    }

    /// Element-wise `self[w] += other[w]`.
    pub fn add(&self, other: &WordDiff) {
        debug_assert!(!std::ptr::eq(self, other), "add requires distinct diffs");
        let mut words = self.words.lock().unwrap();
        let other_words = other.words.lock().unwrap();
        for (word, count) in other_words.iter() {
            *words.entry(word.clone()).or_insert(0) += count;
        }
    }

    /// Element-wise `self[w] -= other[w]`. Counts may go negative
    /// transiently, e.g. when an evicted chunk still carries contributions
    /// that a prune already removed from `self`; readers filter those out.
    pub fn sub(&self, other: &WordDiff) {
        debug_assert!(!std::ptr::eq(self, other), "sub requires distinct diffs");
        let mut words = self.words.lock().unwrap();
        let other_words = other.words.lock().unwrap();
        for (word, count) in other_words.iter() {
            *words.entry(word.clone()).or_insert(0) -= count;
        }
    }

    /// Invoke `f` for every entry. Walk order is unspecified. The diff is
    /// locked for the duration, so `f` must not touch it.
    pub fn walk<F: FnMut(&str, Count)>(&self, mut f: F) {
        let guard = self.lock();
        for (word, count) in guard.iter() {
            f(word, count);
        }
    }

    /// Remove every entry with count <= `min_count` (inclusive).
    pub fn prune(&self, min_count: Count) {
        self.words
            .lock()
            .unwrap()
            .retain(|_, count| *count > min_count);
    }

    /// Number of entries, including zero and negative ones not yet pruned.
    pub fn len(&self) -> usize {
        self.words.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.lock().unwrap().is_empty()
    }

    /// Clone the count table (snapshot export).
    pub fn counts(&self) -> HashMap<String, Count> {
        self.words.lock().unwrap().clone()
    }

    /// Swap the count table out, leaving the diff empty. Used to seal the
    /// pending chunk without keeping its lock across the ring rotation.
    pub fn take(&self) -> HashMap<String, Count> {
        std::mem::take(&mut *self.words.lock().unwrap())
    }

    /// Encode to the versioned binary wire format.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let guard = self.lock();
        codec::encode_diff(guard.as_map())
    }

    /// Decode from the versioned binary wire format.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_counts(codec::decode_diff(bytes)?))
    }
}

/// Lock-held view of a diff. The lock-free read variants live here, so they
/// are only reachable while the lock is actually held.
pub struct DiffGuard<'a> {
    words: MutexGuard<'a, HashMap<String, Count>>,
}

impl DiffGuard<'_> {
    /// Count for `word`, zero when absent.
    pub fn get(&self, word: &str) -> Count {
        self.words.get(word).copied().unwrap_or(0)
    }

    /// Iterate over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Count)> + '_ {
        self.words.iter().map(|(word, count)| (word.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub(crate) fn as_map(&self) -> &HashMap<String, Count> {
        &self.words
    }
}
