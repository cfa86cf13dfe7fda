//! Staging area for extracted native libraries.
//!
//! Most platforms refuse to overwrite a shared library that another process
//! still has mapped, so every extraction claims one of a fixed number of
//! numbered slot directories under the temp dir: `<name>_<user>_<0..9>`.

use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::error::NativeResourceError;
use crate::runtime::Runtime;

/// Number of numbered slot directories tried before giving up.
pub const STAGING_SLOTS: usize = 10;

/// A freshly created, empty file inside a claimed slot directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub directory: PathBuf,
    pub file_path: PathBuf,
    pub owning_user: String,
}

pub struct StagingArea<'a, R: Runtime> {
    runtime: &'a R,
    temp_dir: PathBuf,
    user: String,
    extension: &'static str,
}

impl<'a, R: Runtime> StagingArea<'a, R> {
    pub fn new(runtime: &'a R, temp_dir: impl Into<PathBuf>, extension: &'static str) -> Self {
        let user = runtime.user_name().unwrap_or_else(|| "unknown".to_string());
        Self {
            runtime,
            temp_dir: temp_dir.into(),
            user,
            extension,
        }
    }

    /// Directory for slot `index` of `file_name`.
    pub fn slot_dir(&self, file_name: &str, index: usize) -> PathBuf {
        self.temp_dir
            .join(format!("{}_{}_{}", display_name(file_name), self.user, index))
    }

    /// Claim the first usable slot and create an empty `<file_name><ext>` in it.
    #[tracing::instrument(skip(self))]
    pub fn prepare(&self, file_name: &str) -> Result<StagedFile, NativeResourceError> {
        let mut last_reason = String::from("no slot was tried");

        for index in 0..STAGING_SLOTS {
            let dir = self.slot_dir(file_name, index);
            match self.claim_slot(&dir, file_name) {
                Ok(file_path) => {
                    info!("Staging {} in {:?}", file_name, file_path);
                    return Ok(StagedFile {
                        directory: dir,
                        file_path,
                        owning_user: self.user.clone(),
                    });
                }
                Err(reason) => {
                    debug!("Staging slot {:?} unusable: {}", dir, reason);
                    last_reason = reason;
                }
            }
        }

        Err(NativeResourceError::Deploy {
            file_name: file_name.to_string(),
            reason: format!(
                "all {} staging slots under {:?} are unusable, last: {}",
                STAGING_SLOTS, self.temp_dir, last_reason
            ),
        })
    }

    fn claim_slot(&self, dir: &Path, file_name: &str) -> Result<PathBuf, String> {
        if self.runtime.exists(dir) {
            if !self.runtime.is_dir(dir) {
                return Err("exists and is not a directory".to_string());
            }
            self.clear_slot(dir);
        } else if let Err(e) = self.runtime.create_dir_all(dir) {
            return Err(format!("cannot create directory: {:#}", e));
        }

        if let Err(e) = self.runtime.delete_on_exit(dir) {
            // Only affects cleanup at exit
            debug!("Cannot register {:?} for exit cleanup: {:#}", dir, e);
        }

        let file_path = dir.join(format!("{}{}", file_name, self.extension));
        if self.runtime.exists(&file_path) {
            self.runtime
                .remove_file(&file_path)
                .map_err(|e| format!("stale {:?} cannot be removed: {:#}", file_path, e))?;
        }

        self.runtime
            .create_new_file(&file_path)
            .map_err(|e| format!("cannot create {:?}: {:#}", file_path, e))?;

        if !self.runtime.is_readable(&file_path) {
            return Err(format!("{:?} is not readable", file_path));
        }
        Ok(file_path)
    }

    /// Best-effort removal of whatever a previous run left behind.
    fn clear_slot(&self, dir: &Path) {
        let entries = match self.runtime.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {:?}, leaving contents in place: {:#}", dir, e);
                return;
            }
        };
        for entry in entries {
            let removed = if self.runtime.is_dir(&entry) {
                self.runtime.remove_dir(&entry)
            } else {
                self.runtime.remove_file(&entry)
            };
            if let Err(e) = removed {
                // Typically a library still loaded by another process
                debug!("Leaving {:?} in place: {:#}", entry, e);
            }
        }
    }
}

/// File name component up to the first dot: `libFoo.so` -> `libFoo`.
fn display_name(file_name: &str) -> &str {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    name.split('.').next().unwrap_or(name)
}
