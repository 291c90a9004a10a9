//! Point-in-time state checkpoints.
//!
//! A snapshot lets recovery skip the bulk of the WAL: install the newest
//! checkpoint, then replay only the events after it. The filename
//! `snapshot_<seq>_<ts>.json` is the sole source of truth for ordering;
//! the file body is only read for the winner.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use seqtape_models::{Balance, MarketState, Order};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encode: {0}")]
    Encode(#[from] serde_json::Error),
}

/// State as of a processed sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Last processed sequence number.
    pub seq: u64,
    /// Creation time, Unix seconds.
    pub ts_unix: i64,
    pub markets: HashMap<String, MarketState>,
    /// Balances as of `seq`; without them a snapshot-then-tail recovery
    /// would lose every fill the tail no longer contains.
    #[serde(default)]
    pub balances: BTreeMap<String, Balance>,
    /// Orders still open at `seq`: a fill in the tail may reference an
    /// order created before the checkpoint.
    #[serde(default)]
    pub open_orders: Vec<Order>,
}

pub struct SnapshotManager {
    dir: PathBuf,
}

impl SnapshotManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write a snapshot; creates the directory on first use.
    pub fn save(&self, snap: &Snapshot) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("snapshot_{}_{}.json", snap.seq, snap.ts_unix));
        let data = serde_json::to_vec_pretty(snap)?;
        fs::write(&path, data)?;
        info!(seq = snap.seq, path = %path.display(), "snapshot saved");
        Ok(())
    }

    /// Load the snapshot with the highest sequence number. A directory that
    /// does not exist yet simply means "no snapshot".
    pub fn load_latest(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest: Option<(u64, PathBuf)> = None;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some((seq, _ts)) = parse_snapshot_name(&name.to_string_lossy()) else {
                continue;
            };
            if latest.as_ref().map_or(true, |(best, _)| seq > *best) {
                latest = Some((seq, entry.path()));
            }
        }

        let Some((seq, path)) = latest else {
            return Ok(None);
        };

        let data = fs::read(&path)?;
        let snap: Snapshot = serde_json::from_slice(&data)?;
        info!(seq, path = %path.display(), "snapshot loaded");
        Ok(Some(snap))
    }

    /// Delete all but the newest `keep_count` snapshots (by sequence).
    pub fn cleanup(&self, keep_count: usize) -> Result<(), SnapshotError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<(u64, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if let Some((seq, _)) = parse_snapshot_name(&name.to_string_lossy()) {
                files.push((seq, entry.path()));
            }
        }

        if files.len() <= keep_count {
            return Ok(());
        }

        files.sort_by(|a, b| b.0.cmp(&a.0));
        for (seq, path) in files.into_iter().skip(keep_count) {
            match fs::remove_file(&path) {
                Ok(()) => info!(seq, path = %path.display(), "removed old snapshot"),
                Err(e) => warn!(seq, path = %path.display(), error = %e, "failed to remove old snapshot"),
            }
        }
        Ok(())
    }
}

/// Parse `snapshot_<seq>_<ts>.json` into `(seq, ts)`.
fn parse_snapshot_name(name: &str) -> Option<(u64, i64)> {
    let rest = name.strip_prefix("snapshot_")?.strip_suffix(".json")?;
    let (seq, ts) = rest.split_once('_')?;
    Some((seq.parse().ok()?, ts.parse().ok()?))
}
