//! # trendwords
//!
//! Streaming trend-detection engine: ingests a live firehose of short
//! messages, counts word usage over a sliding window and over all time, and
//! surfaces the words whose current usage rate most exceeds their long-term
//! average. Common words suppress themselves through the long-term counter,
//! so no stopword list is required.
//!
//! **Architecture:** one ingest worker feeding two shared counters and a ring
//! of sealed per-chunk diffs, a periodic ranker, a snapshot store for crash
//! recovery, and an HTTP surface for rankings and chunk fan-out.

pub mod broadcast;
pub mod codec;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod ranker;
pub mod ring;
pub mod server;
pub mod snapshot;
pub mod tokenizer;

pub use engine::Engine;
pub use error::{Error, Result};
pub use server::{build_router, AppState};
