//! Daily usage gating.
//!
//! Each completed evaluation costs real model tokens, so deployments cap how
//! many evaluations run per day. The pipeline consults a [`UsageGate`]
//! before doing any work and records one unit of usage only after an
//! evaluation fully succeeds; a failed run never counts against the cap.
//!
//! [`FileUsageGate`] is the bundled store: a small JSON file mapping local
//! dates to counts. An in-process mutex makes read-then-increment atomic
//! within one process; deployments that run several processes against one
//! file should substitute a gate backed by a transactional store instead.

use chrono::Local;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Read/increment contract for the daily counter.
///
/// `usage_today` and `record_usage` are separate calls: the pipeline reads
/// the count once up front and increments only on success, so a gate
/// implementation must tolerate reads that are never followed by a write.
pub trait UsageGate: Send + Sync {
    /// Number of evaluations recorded for the current day.
    fn usage_today(&self) -> io::Result<u32>;

    /// Record one completed evaluation against the current day.
    fn record_usage(&self) -> io::Result<()>;
}

/// JSON-file-backed usage counter keyed by local date (`YYYY-MM-DD`).
pub struct FileUsageGate {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileUsageGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn today() -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }

    fn load(&self) -> io::Result<BTreeMap<String, u32>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Atomic persist: write a sibling temp file, then rename over the
    /// target, so a crash mid-write never leaves a truncated counter.
    fn store(&self, counts: &BTreeMap<String, u32>) -> io::Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(counts)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(&tmp_path, body)?;
        std::fs::rename(&tmp_path, &self.path)
    }
}

impl UsageGate for FileUsageGate {
    fn usage_today(&self) -> io::Result<u32> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let counts = self.load()?;
        Ok(counts.get(&Self::today()).copied().unwrap_or(0))
    }

    fn record_usage(&self) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut counts = self.load()?;
        let today = Self::today();
        let count = counts.entry(today.clone()).or_insert(0);
        *count += 1;
        debug!("usage for {today}: {count}");
        self.store(&counts)
    }
}

/// In-memory gate, useful in tests and for deployments without a cap.
#[derive(Default)]
pub struct MemoryUsageGate {
    count: Mutex<u32>,
}

impl MemoryUsageGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl UsageGate for MemoryUsageGate {
    fn usage_today(&self) -> io::Result<u32> {
        Ok(self.count())
    }

    fn record_usage(&self) -> io::Result<()> {
        *self.count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
