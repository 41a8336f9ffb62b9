//! trendwords — streaming emerging-word detection service
//!
//! Ingests a live message stream, maintains sliding-window and long-horizon
//! word counters, and serves ranked emerging words plus chunk fan-out over
//! HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trendwords::config::{self, Config, Overrides};
use trendwords::engine::Engine;
use trendwords::server::{self, AppState};
use trendwords::snapshot::SnapshotStore;
use trendwords::tokenizer::Tokenizer;
use trendwords::{ingest, ranker};

/// Streaming emerging-word detection service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address to bind to
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Recovery snapshot path
    #[arg(long, value_name = "FILE")]
    recovery: Option<PathBuf>,

    /// Messages per sealed chunk
    #[arg(long, value_name = "N")]
    agg_size: Option<u64>,

    /// Chunks per sliding window
    #[arg(long, value_name = "N")]
    focus_period: Option<usize>,

    /// Newline-delimited stopword file applied before counting
    #[arg(long, value_name = "FILE")]
    stopwords: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("trendwords={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("trendwords v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::resolve(Overrides {
        host: args.host,
        port: args.port,
        recovery: args.recovery,
        agg_size: args.agg_size,
        focus_period: args.focus_period,
        stopwords: args.stopwords,
    })?;
    if config.production {
        info!("running in PRODUCTION mode (TLS terminated by the fronting proxy)");
    }
    if config.bearer_token.is_none() {
        warn!("TWITTER_BEARER is not set; upstream requests will be unauthenticated");
    }

    let tokenizer = match &config.stopwords {
        Some(path) => Tokenizer::with_stopwords(config::load_stopwords(path)?),
        None => Tokenizer::new(),
    };
    let mut engine = Engine::new(config.counting, tokenizer);

    let store = SnapshotStore::new(&config.recovery_path);
    store.prepare()?;
    match store.load(&mut engine) {
        Ok(()) => info!(
            total = engine.total_messages(),
            "restored state from {}",
            store.path().display()
        ),
        Err(e) => {
            warn!(error = %e, "could not restore snapshot, starting empty");
            // a snapshot path that can neither be read nor written is an
            // unrecoverable misconfiguration
            store.save(&engine)?;
        }
    }

    let engine = Arc::new(engine);
    tokio::spawn(ranker::run(engine.clone()));
    tokio::spawn(ingest::run(engine.clone(), store, config.clone()));

    server::start(&config.bind_addr, AppState::new(engine)).await
}
