//! Counting and ranking behavior through the Engine
//!
//! Exercises the full per-message pipeline: tokenize, triple increment,
//! chunk seal/evict rotation, pruning, and the ranking pass over the two
//! counters.

use std::collections::HashMap;

use trendwords::config::CountingConfig;
use trendwords::diff::WordDiff;
use trendwords::engine::Engine;
use trendwords::ranker;
use trendwords::tokenizer::Tokenizer;

fn engine(agg_size: u64, focus_period: usize) -> Engine {
    Engine::new(
        CountingConfig {
            agg_size,
            focus_period,
            ..Default::default()
        },
        Tokenizer::new(),
    )
}

/// Sum the sealed chunks currently in the ring, element-wise.
fn ring_sum(engine: &Engine) -> HashMap<String, i64> {
    let mut sum: HashMap<String, i64> = HashMap::new();
    for chunk in engine.recovery_point().chunks {
        for (word, count) in chunk {
            *sum.entry(word).or_insert(0) += count;
        }
    }
    sum
}

/// Focus counts with zero-valued residue dropped.
fn focus_nonzero(engine: &Engine) -> HashMap<String, i64> {
    engine
        .focus()
        .counts()
        .into_iter()
        .filter(|(_, count)| *count != 0)
        .collect()
}

#[test]
fn steady_vocabulary_suppresses_itself() {
    // one full window of identical messages: every word's window rate equals
    // its long-term rate, so nothing is emerging
    let engine = engine(300, 1);
    for _ in 0..300 {
        engine.ingest("the quick fox");
    }

    assert_eq!(engine.chunks_sealed(), 1);
    assert_eq!(engine.focus().get("the"), 300);
    assert_eq!(engine.focus().get("quick"), 300);
    assert_eq!(engine.long().get("fox"), 300);

    assert!(ranker::rank(&engine, 100).is_empty());
}

#[test]
fn rankings_are_empty_during_warmup() {
    let engine = engine(300, 300);
    for _ in 0..1000 {
        engine.ingest("sudden spike spike spike");
    }
    // fewer messages than one full window: the adjustment ratio is zero
    assert!(ranker::rank(&engine, 100).is_empty());
}

#[test]
fn emerging_word_outranks_steady_words() {
    let engine = engine(300, 1);
    // long-term history: 100 windows of common words
    for _ in 0..30_000 {
        engine.ingest("the quick fox");
    }
    // one window where a novel word bursts
    for _ in 0..200 {
        engine.ingest("the banana");
    }
    for _ in 0..100 {
        engine.ingest("the");
    }

    let top = ranker::rank(&engine, 100);
    assert_eq!(top.len(), 1);
    let best = &top[0];
    assert_eq!(best.word, "banana");
    // adjustment ratio is 30300/300 = 101; banana's scaled long-term rate is
    // 200/101 = 1, so the adjusted count is 199
    assert_eq!(best.count, 199);
    assert_eq!(best.multiple, 200.0);
    assert!(best.word_score > 0.5);
}

#[test]
fn hashtags_are_counted_but_never_ranked() {
    let engine = engine(300, 1);
    for _ in 0..30_000 {
        engine.ingest("the quick fox");
    }
    for _ in 0..300 {
        engine.ingest("#spike spike");
    }

    assert_eq!(engine.focus().get("#spike"), 300);
    let top = ranker::rank(&engine, 100);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].word, "spike");
}

#[test]
fn adjusted_count_at_the_minimum_is_not_admitted() {
    let engine = engine(300, 1);
    for _ in 0..30_000 {
        engine.ingest("the quick fox");
    }
    // 100 occurrences adjust to exactly the minimum count: rejected
    for _ in 0..100 {
        engine.ingest("seldom");
    }
    for _ in 0..200 {
        engine.ingest("the");
    }
    assert!(ranker::rank(&engine, 100).is_empty());
}

#[test]
fn adjusted_count_above_the_minimum_is_admitted() {
    let engine = engine(300, 1);
    for _ in 0..30_000 {
        engine.ingest("the quick fox");
    }
    for _ in 0..102 {
        engine.ingest("seldom");
    }
    for _ in 0..198 {
        engine.ingest("the");
    }
    let top = ranker::rank(&engine, 100);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].word, "seldom");
    assert_eq!(top[0].count, 101);
}

#[test]
fn sealing_a_full_window_evicts_the_oldest_chunk() {
    let engine = engine(10, 2);
    for _ in 0..10 {
        engine.ingest("apple");
    }
    for _ in 0..10 {
        engine.ingest("berry");
    }
    for _ in 0..10 {
        engine.ingest("apple");
    }

    assert_eq!(engine.chunks_sealed(), 3);
    // the first apple chunk fell out of the window
    assert_eq!(engine.focus().get("apple"), 10);
    assert_eq!(engine.focus().get("berry"), 10);
    assert_eq!(focus_nonzero(&engine), ring_sum(&engine));
}

#[test]
fn focus_equals_ring_plus_pending_mid_chunk() {
    let engine = engine(10, 2);
    for _ in 0..20 {
        engine.ingest("apple");
    }
    for _ in 0..5 {
        engine.ingest("cherry");
    }

    let mut expected = ring_sum(&engine);
    for (word, count) in engine.pending_counts() {
        *expected.entry(word).or_insert(0) += count;
    }
    assert_eq!(focus_nonzero(&engine), expected);
}

#[test]
fn ranker_output_is_ascending_and_duplicate_free() {
    let engine = engine(300, 1);
    for _ in 0..30_000 {
        engine.ingest("the quick fox");
    }
    for _ in 0..150 {
        engine.ingest("banana cherry durian");
    }
    for _ in 0..150 {
        engine.ingest("banana elder");
    }

    let top = ranker::rank(&engine, 100);
    assert!(!top.is_empty());
    assert!(top.len() <= 100);
    for pair in top.windows(2) {
        assert!(pair[0].word_score <= pair[1].word_score);
    }
    let mut words: Vec<&str> = top.iter().map(|entry| entry.word.as_str()).collect();
    words.sort_unstable();
    words.dedup();
    assert_eq!(words.len(), top.len());
}

#[test]
fn focus_prune_preserves_rankings() {
    let engine = engine(300, 1);
    for _ in 0..30_000 {
        engine.ingest("the quick fox");
    }
    for _ in 0..200 {
        engine.ingest("the banana");
    }
    for _ in 0..100 {
        engine.ingest("the");
    }

    let before = ranker::rank(&engine, 100);
    assert!(!before.is_empty());
    engine.focus().prune(0);
    let after = ranker::rank(&engine, 100);
    assert_eq!(before, after);
}

#[test]
fn negative_focus_counts_are_tolerated() {
    let engine = engine(300, 1);
    for _ in 0..300 {
        engine.ingest("the quick fox");
    }
    // mimic an eviction racing a prune: subtracting pushes a count negative
    let stale = WordDiff::new();
    for _ in 0..500 {
        stale.inc("the");
    }
    engine.focus().sub(&stale);
    assert!(engine.focus().get("the") < 0);

    // the ranking pass filters negatives through the minimum-count gate
    assert!(ranker::rank(&engine, 100).is_empty());
}
