//! Upstream stream ingestion
//!
//! Reads the newline-delimited JSON sample stream, hands each frame to the
//! engine, and keeps the connection alive forever: the upstream is allowed
//! to die at any time, so every failure ends in a backoff and a fresh
//! connection. Delivery is at-most-once — no frame is ever retried.

use std::error::Error as _;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::snapshot::SnapshotStore;

const FRAME_CHANNEL_CAPACITY: usize = 1024;

/// Cooloff after a connection reset; the upstream rate-limits aggressively
/// after resets.
const RESET_BACKOFF: Duration = Duration::from_secs(5);
/// Backoff after EOF or any other read/connect error.
const READ_BACKOFF: Duration = Duration::from_secs(1);
/// Cooloff after a non-200 response.
const STATUS_BACKOFF: Duration = Duration::from_secs(3);

/// One upstream frame. Only `data.text` feeds the counters; the rest rides
/// along for logging and future use.
#[derive(Debug, Deserialize)]
pub struct StreamFrame {
    pub data: FrameData,
}

#[derive(Debug, Deserialize)]
pub struct FrameData {
    pub text: String,
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author_id: String,
}

/// Run the ingest worker: a processing task draining the frame channel plus
/// the reconnect loop feeding it. Never returns.
pub async fn run(engine: Arc<Engine>, store: SnapshotStore, config: Config) {
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    tokio::spawn(process_frames(engine, store, rx));

    let client = reqwest::Client::new();
    loop {
        if let Some(backoff) = stream_once(&client, &config, &tx).await {
            time::sleep(backoff).await;
        }
    }
}

/// Drain the frame channel into the engine, writing a snapshot whenever the
/// long-prune branch says one is due.
async fn process_frames(
    engine: Arc<Engine>,
    store: SnapshotStore,
    mut rx: mpsc::Receiver<StreamFrame>,
) {
    while let Some(frame) = rx.recv().await {
        let outcome = engine.ingest(&frame.data.text);
        if outcome.snapshot_due {
            if let Err(e) = store.save(&engine) {
                warn!(
                    error = %e,
                    path = %store.path().display(),
                    "snapshot save failed, retrying next period"
                );
            }
        }
    }
}

/// Hold one upstream connection open until it dies. Returns how long to back
/// off before reconnecting, or `None` to reconnect immediately.
async fn stream_once(
    client: &reqwest::Client,
    config: &Config,
    tx: &mpsc::Sender<StreamFrame>,
) -> Option<Duration> {
    debug!(url = %config.stream_url, "connecting to upstream stream");
    let mut request = client.get(&config.stream_url);
    if let Some(token) = &config.bearer_token {
        request = request.bearer_auth(token);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "upstream request failed");
            return Some(READ_BACKOFF);
        }
    };

    if response.status() != StatusCode::OK {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(%status, body, "upstream returned non-200, cooling off");
        return Some(STATUS_BACKOFF);
    }

    info!("upstream stream established");
    let mut body = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    loop {
        match body.next().await {
            Some(Ok(bytes)) => {
                buffer.extend_from_slice(&bytes);
                while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    if let Some(frame) = parse_frame(&line) {
                        if tx.send(frame).await.is_err() {
                            return None;
                        }
                    }
                }
            }
            Some(Err(e)) => {
                if is_connection_reset(&e) {
                    warn!(error = %e, "upstream connection reset, cooling off");
                    return Some(RESET_BACKOFF);
                }
                warn!(error = %e, "upstream read error");
                return Some(READ_BACKOFF);
            }
            None => {
                info!("upstream stream ended");
                return Some(READ_BACKOFF);
            }
        }
    }
}

/// Parse one stream line. Blank keep-alive lines and malformed frames are
/// dropped; the stream is at-most-once so nothing is retried.
fn parse_frame(line: &[u8]) -> Option<StreamFrame> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_slice(trimmed) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(
                error = %e,
                line = %String::from_utf8_lossy(trimmed),
                "dropping malformed frame"
            );
            None
        }
    }
}

/// Walk the error's source chain looking for a connection reset.
fn is_connection_reset(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_frame() {
        let line = br#"{"data":{"text":"hello world","id":"1","created_at":"2023-04-01T12:00:00Z","author_id":"42"}}"#;
        let frame = parse_frame(line).unwrap();
        assert_eq!(frame.data.text, "hello world");
        assert_eq!(frame.data.author_id, "42");
    }

    #[test]
    fn skips_keepalive_and_malformed_lines() {
        assert!(parse_frame(b"\r\n").is_none());
        assert!(parse_frame(b"").is_none());
        assert!(parse_frame(b"{not json}\n").is_none());
    }
}
