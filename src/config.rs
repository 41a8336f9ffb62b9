//! Service configuration
//!
//! Resolution priority follows the usual order: command-line argument, then
//! environment variable, then compiled default.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Messages per sealed chunk.
pub const DEFAULT_AGG_SIZE: u64 = 300;

/// Chunks considered at one time; the sliding window spans
/// `AGG_SIZE * FOCUS_PERIOD` messages.
pub const DEFAULT_FOCUS_PERIOD: usize = 300;

/// Zero counts have no effect on the focus counter, so they are swept
/// frequently to keep the walk cheap.
pub const DEFAULT_FOCUS_PRUNE_PERIOD: u64 = 10_000;

/// One-counts have an infinitesimal effect on the long-term averages once
/// divided by the global message count; sweeping them bounds memory. The
/// snapshot is written right after each sweep.
pub const DEFAULT_LONG_PRUNE_PERIOD: u64 = 360_000;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STREAM_URL: &str = "https://api.twitter.com/2/tweets/sample/stream";
const DEFAULT_RECOVERY_PATH: &str = "backups/top_tweets_recovery.dat";

/// Counting tunables shared by the engine and its tests.
#[derive(Debug, Clone, Copy)]
pub struct CountingConfig {
    /// Messages per sealed chunk
    pub agg_size: u64,
    /// Chunks per sliding window
    pub focus_period: usize,
    /// Messages between focus-counter sweeps (count <= 0)
    pub focus_prune_period: u64,
    /// Messages between long-counter sweeps (count <= 1) and snapshots
    pub long_prune_period: u64,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            agg_size: DEFAULT_AGG_SIZE,
            focus_period: DEFAULT_FOCUS_PERIOD,
            focus_prune_period: DEFAULT_FOCUS_PRUNE_PERIOD,
            long_prune_period: DEFAULT_LONG_PRUNE_PERIOD,
        }
    }
}

/// Values collected from the command line; each one wins over its
/// environment/default counterpart when present.
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub recovery: Option<PathBuf>,
    pub agg_size: Option<u64>,
    pub focus_period: Option<usize>,
    pub stopwords: Option<PathBuf>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// `host:port` the HTTP server binds to
    pub bind_addr: String,
    /// Upstream sample-stream URL (`TREND_STREAM_URL`)
    pub stream_url: String,
    /// Bearer token for the upstream stream (`TWITTER_BEARER`)
    pub bearer_token: Option<String>,
    /// True when `TOP_TWEETS_MODE=PRODUCTION`
    pub production: bool,
    /// Recovery snapshot path
    pub recovery_path: PathBuf,
    /// Counting tunables
    pub counting: CountingConfig,
    /// Optional newline-delimited stopword file
    pub stopwords: Option<PathBuf>,
}

impl Config {
    /// Resolve the full configuration from CLI overrides and the environment.
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        let host = overrides.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = overrides.port.unwrap_or(DEFAULT_PORT);

        let mut counting = CountingConfig::default();
        if let Some(agg_size) = overrides.agg_size {
            counting.agg_size = agg_size;
        }
        if let Some(focus_period) = overrides.focus_period {
            counting.focus_period = focus_period;
        }
        if counting.agg_size == 0 || counting.focus_period == 0 {
            return Err(Error::Config(
                "agg-size and focus-period must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            bind_addr: format!("{host}:{port}"),
            stream_url: std::env::var("TREND_STREAM_URL")
                .unwrap_or_else(|_| DEFAULT_STREAM_URL.to_string()),
            bearer_token: std::env::var("TWITTER_BEARER")
                .ok()
                .filter(|token| !token.is_empty()),
            production: std::env::var("TOP_TWEETS_MODE")
                .map(|mode| mode == "PRODUCTION")
                .unwrap_or(false),
            recovery_path: overrides
                .recovery
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RECOVERY_PATH)),
            counting,
            stopwords: overrides.stopwords,
        })
    }
}

/// Load a newline-delimited stopword file. Entries are lowercased; blank
/// lines and `#` comment lines are ignored.
pub fn load_stopwords(path: &Path) -> Result<HashSet<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect())
}
