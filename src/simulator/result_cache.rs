//! Keyed by `(topology hash, task count)`; lets the orchestrator skip a
//! simulator invocation entirely when nothing relevant has changed since
//! the last run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::error::CacheError;
use crate::model::Topology;

struct CacheEntry {
    topology_hash: String,
    task_count: usize,
    run_dir: PathBuf,
}

pub struct ResultCache {
    state: Mutex<Option<CacheEntry>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CacheEntry>> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// `true` iff the last recorded run used the same topology and task
    /// count, and its run directory is still present on disk.
    pub fn can_reuse(&self, topology: &Topology, task_count: usize) -> Result<bool, CacheError> {
        let hash = topology_hash(topology)?;
        let guard = self.lock();
        Ok(match &*guard {
            Some(entry) => {
                entry.topology_hash == hash && entry.task_count == task_count && entry.run_dir.exists()
            }
            None => false,
        })
    }

    pub fn last_run_dir(&self) -> Option<PathBuf> {
        self.lock().as_ref().map(|e| e.run_dir.clone())
    }

    /// Recursive copy of an entire run directory. The destination is
    /// removed first if it already exists.
    pub fn copy_to_new_run(&self, source_run_dir: &Path, destination_run_dir: &Path) -> Result<(), CacheError> {
        if destination_run_dir.exists() {
            fs::remove_dir_all(destination_run_dir)?;
        }
        copy_dir_recursive(source_run_dir, destination_run_dir)?;
        Ok(())
    }

    pub fn update(&self, topology: &Topology, task_count: usize, run_dir: PathBuf) -> Result<(), CacheError> {
        let hash = topology_hash(topology)?;
        *self.lock() = Some(CacheEntry {
            topology_hash: hash,
            task_count,
            run_dir,
        });
        Ok(())
    }

    /// Invoked when the calibrator publishes a new topology, so the next
    /// simulation run always re-computes instead of reusing a stale cache.
    pub fn clear(&self) {
        *self.lock() = None;
    }
}

fn topology_hash(topology: &Topology) -> Result<String, CacheError> {
    let canonical = topology.canonical_json()?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest_path = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)?;
        }
    }
    Ok(())
}
