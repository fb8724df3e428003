use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};

/// Registry of intermediate files that have not been reclaimed yet.
///
/// The owning operation deletes its files and releases them as part of its
/// normal flow; the at-exit sweep only catches paths orphaned by a task that
/// never reached its cleanup (e.g. the process was interrupted mid-send).
#[derive(Debug, Default)]
pub struct TempFileLedger {
    paths: Mutex<Vec<PathBuf>>,
}

impl TempFileLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: &Path) {
        let mut paths = self.paths.lock().expect("temp ledger poisoned");
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_path_buf());
        }
    }

    pub fn release(&self, path: &Path) {
        let mut paths = self.paths.lock().expect("temp ledger poisoned");
        paths.retain(|p| p != path);
    }

    pub fn tracked(&self) -> usize {
        self.paths.lock().expect("temp ledger poisoned").len()
    }

    /// Delete every still-existing registered path, then clear the registry.
    /// Individual deletion failures are logged, never raised.
    pub async fn sweep(&self) {
        let paths = std::mem::take(&mut *self.paths.lock().expect("temp ledger poisoned"));
        for path in paths {
            remove_temp_file(&path).await;
        }
    }
}

/// Best-effort deletion with the ledger's logging policy.
pub async fn remove_temp_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Deleted temp file: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to delete temp file {}: {e}", path.display()),
    }
}
