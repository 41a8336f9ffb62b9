//! Periodic ranking pass
//!
//! Derives a score for every word in the focus window from the ratio of its
//! current usage rate to its long-term rate. Dividing the long counter by
//! the adjustment ratio scales it into focus-window units, so `adjusted`
//! measures excess activity over the word's own history; omnipresent words
//! cancel themselves out and no stopword list is needed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::diff::Count;
use crate::engine::Engine;

pub const MIN_MULTIPLE: f32 = 2.0;
pub const MAX_MULTIPLE: f32 = 15.0;
pub const MIN_COUNT: Count = 100;
pub const MAX_ADJUSTED_COUNT: f32 = 3000.0;

/// Entries kept by the periodic pass; `/api/words/top` serves this many by
/// default straight from the cache.
pub const TOP_CACHE_SIZE: usize = 100;

const RANK_PERIOD: Duration = Duration::from_secs(1);

/// One ranked word. `count` is the adjusted count: focus count minus the
/// word's scaled long-term rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankedWord {
    pub word: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    pub count: Count,
    pub multiple: f32,
    #[serde(rename = "wordScore")]
    pub word_score: f32,
}

/// Run one ranking pass over the focus window.
///
/// Holds the focus lock, then the long lock, for the whole walk, so the pass
/// observes a single consistent snapshot of both counters. Returns entries
/// ascending by score; empty during warm-up or when nothing clears the
/// admission gates.
pub fn rank(engine: &Engine, top_amount: usize) -> Vec<RankedWord> {
    let counting = engine.counting();
    let window = counting.focus_period as u64 * counting.agg_size;
    let adjustment_ratio = (engine.total_messages() / window) as Count;
    if adjustment_ratio == 0 || top_amount == 0 {
        return Vec::new();
    }

    let focus = engine.focus().lock();
    let long = engine.long().lock();

    let mut top = vec![RankedWord::default(); top_amount];
    let mut admitted = false;

    for (word, count) in focus.iter() {
        if word.starts_with('#') {
            continue;
        }
        // negative counts from chunk eviction land here too
        if count < MIN_COUNT {
            continue;
        }
        let long_count = long.get(word);
        if long_count == 0 {
            continue;
        }

        let multiple = if long_count < adjustment_ratio {
            MAX_MULTIPLE
        } else {
            count as f32 / ((long_count / adjustment_ratio) as f32)
        };
        let adjusted = count - long_count / adjustment_ratio;
        let word_score = (multiple - MIN_MULTIPLE).min(MAX_MULTIPLE) / MAX_MULTIPLE * 0.5
            + (adjusted as f32).min(MAX_ADJUSTED_COUNT) / MAX_ADJUSTED_COUNT * 0.5;

        if adjusted > MIN_COUNT && multiple > MIN_MULTIPLE && word_score > top[0].word_score {
            admitted = true;
            insert(
                &mut top,
                RankedWord {
                    word: word.to_owned(),
                    translation: None,
                    count: adjusted,
                    multiple,
                    word_score,
                },
            );
        }
    }

    drop(long);
    drop(focus);

    if !admitted {
        return Vec::new();
    }
    // unfilled slots are zero-count placeholders; drop them
    let first_real = top
        .iter()
        .rposition(|entry| entry.count == 0)
        .map_or(0, |index| index + 1);
    top.drain(..first_real);
    top
}

/// Insert into an ascending array of fixed size: everything below the
/// insertion point shifts left one slot (dropping the weakest entry) and the
/// new entry lands just before the first incumbent it does not beat. Ties
/// keep the incumbent.
fn insert(top: &mut [RankedWord], entry: RankedWord) {
    let pos = top
        .iter()
        .position(|incumbent| entry.word_score <= incumbent.word_score)
        .unwrap_or(top.len());
    // admission requires beating top[0], so pos >= 1
    let index = pos - 1;
    top[..=index].rotate_left(1);
    top[index] = entry;
}

/// Periodic ranker task: refresh the top cache roughly once a second.
pub async fn run(engine: Arc<Engine>) {
    let mut ticker = time::interval(RANK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let started = Instant::now();
        let top = rank(&engine, TOP_CACHE_SIZE);
        engine.set_top(top);
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ranking pass complete"
        );
    }
}
