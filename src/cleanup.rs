//! Exit-time cleanup of staging directories.
//!
//! A loaded native library cannot be removed while the process still holds it,
//! so staged files and their directories are registered here and removed on a
//! best-effort basis when [`run_exit_cleanup`] is called at shutdown.

use anyhow::{Result, anyhow};
use log::debug;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

/// Tracks paths that should be removed when the process exits
#[derive(Default)]
pub struct CleanupContext {
    #[cfg(test)]
    pub paths: Vec<PathBuf>,
    #[cfg(not(test))]
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path to be cleaned up. Registering the same path twice is a no-op.
    pub fn add(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Clean up all registered paths, most recently registered first.
    ///
    /// Directories are only removed once empty, which mirrors the fact that a
    /// library still mapped into another process keeps its directory alive.
    pub fn cleanup(&self) {
        for path in self.paths.iter().rev() {
            debug!("Cleaning up: {:?}", path);
            let result = if path.is_dir() {
                std::fs::remove_dir(path)
            } else {
                std::fs::remove_file(path)
            };
            if let Err(e) = result {
                // Best effort: a still-loaded library or a foreign file keeps the path alive
                debug!("Leaving {:?} in place: {}", path, e);
            }
        }
    }
}

/// Type alias for shared cleanup context
pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

/// Create a new shared cleanup context
pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

fn exit_registry() -> &'static SharedCleanupContext {
    static REGISTRY: OnceLock<SharedCleanupContext> = OnceLock::new();
    REGISTRY.get_or_init(new_shared)
}

/// Register a path with the process-wide exit cleanup registry.
pub fn register_on_exit(path: PathBuf) -> Result<()> {
    let mut guard = exit_registry()
        .lock()
        .map_err(|_| anyhow!("exit cleanup registry is poisoned"))?;
    guard.add(path);
    Ok(())
}

/// Remove every path registered through [`register_on_exit`].
///
/// Applications call this right before they exit.
pub fn run_exit_cleanup() {
    match exit_registry().lock() {
        Ok(guard) => guard.cleanup(),
        Err(_) => debug!("exit cleanup registry is poisoned, skipping cleanup"),
    }
}
