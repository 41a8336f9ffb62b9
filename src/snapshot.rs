//! Durable state snapshots
//!
//! The long counter only survives restarts through these files, so a save
//! happens right after every long prune and the file is replaced atomically:
//! the encoding is written to `<path>.tmp`, synced, then renamed over the
//! live file. A missing or undecodable file at startup is not fatal — the
//! worker logs and starts empty.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::codec;
use crate::diff::Count;
use crate::engine::Engine;
use crate::error::Result;

/// Everything needed to resume counting after a restart. Chunks appear
/// oldest to newest; the pending chunk is intentionally absent (counts since
/// the last seal are lost on crash).
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPoint {
    pub total_messages: u64,
    pub agg_size: u64,
    pub focus_period: usize,
    pub long: HashMap<String, Count>,
    pub focus: HashMap<String, Count>,
    pub chunks: Vec<HashMap<String, Count>>,
    pub translations: HashMap<String, String>,
}

/// Reads and writes the recovery file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the snapshot directory if it does not exist yet.
    pub fn prepare(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Write the engine's recovery point atomically.
    pub fn save(&self, engine: &Engine) -> Result<()> {
        let started = Instant::now();
        let point = engine.recovery_point();
        let bytes = codec::encode_recovery(&point)?;

        let tmp = self.tmp_path();
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            total = point.total_messages,
            "snapshot written"
        );
        Ok(())
    }

    /// Decode the recovery file and overwrite the engine's runtime state.
    /// Must be called before the workers start.
    pub fn load(&self, engine: &mut Engine) -> Result<()> {
        let bytes = fs::read(&self.path)?;
        let point = codec::decode_recovery(&bytes)?;
        engine.install(point);
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}
