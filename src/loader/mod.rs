//! Deploy-and-load sequence with its fallback chain.
//!
//! A load walks an explicit list of [`Candidate`]s: the bundled library (or
//! the ARM ABI variants), the legacy build on Unix-like systems, then the
//! standard library search path under the bare and the alias name. Each
//! attempt yields a result value; the first success wins and every failure is
//! kept for diagnostics.

mod candidate;

use log::{debug, info, warn};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::{LoaderConfig, USERLIB_SYSTEM};
use crate::error::{FailedAttempt, LinkError, NativeResourceError};
use crate::inspect;
use crate::native::{NativeLoader, NativeModule};
use crate::platform::PlatformTag;
use crate::resource::{self, ResourceBundle};
use crate::runtime::Runtime;
use crate::staging::{StagedFile, StagingArea};

pub use candidate::{ALIAS_LIBRARY, Candidate, bundled_variants, candidate_chain, system_name};

/// Library loaded by the serial subsystem.
pub const DEFAULT_LIBRARY: &str = "libNRJavaSerial";

/// How the library was finally obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LoadSource {
    /// A candidate from the fallback chain
    Chain { candidate: Candidate },
    /// The `userlib` override
    Override { value: String },
}

/// Summary of a successful load, suitable for printing.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub library: String,
    pub platform: PlatformTag,
    pub source: LoadSource,
    /// Path or name handed to the native loader
    pub origin: String,
    /// Candidates that failed before the successful one
    pub failed: Vec<FailedAttempt>,
}

/// Why one candidate of the chain did not produce a library.
#[derive(Debug)]
pub enum AttemptError {
    /// This candidate is unusable; later candidates may still work
    Candidate(FailedAttempt),
    /// No staging slot could be provisioned, which ends the whole load
    Deploy(NativeResourceError),
}

impl From<FailedAttempt> for AttemptError {
    fn from(failure: FailedAttempt) -> Self {
        AttemptError::Candidate(failure)
    }
}

/// A native library mapped into the process. Dropping it may unload the code.
pub struct LoadedLibrary {
    pub module: Box<dyn NativeModule>,
    pub staged: Option<StagedFile>,
    pub report: LoadReport,
}

pub struct Loader<'a, R: Runtime> {
    runtime: &'a R,
    bundle: &'a dyn ResourceBundle,
    native: &'a dyn NativeLoader,
    config: &'a LoaderConfig,
    platform: PlatformTag,
}

impl<'a, R: Runtime> Loader<'a, R> {
    /// Create a loader for the platform the runtime reports.
    pub fn new(
        runtime: &'a R,
        bundle: &'a dyn ResourceBundle,
        native: &'a dyn NativeLoader,
        config: &'a LoaderConfig,
    ) -> Self {
        let platform = PlatformTag::detect(runtime);
        Self::with_platform(runtime, bundle, native, config, platform)
    }

    pub fn with_platform(
        runtime: &'a R,
        bundle: &'a dyn ResourceBundle,
        native: &'a dyn NativeLoader,
        config: &'a LoaderConfig,
        platform: PlatformTag,
    ) -> Self {
        Self {
            runtime,
            bundle,
            native,
            config,
            platform,
        }
    }

    pub fn platform(&self) -> &PlatformTag {
        &self.platform
    }

    /// Load `library_name`, honouring the `userlib` override and otherwise
    /// walking the candidate chain until one candidate loads and passes the
    /// self-test.
    #[tracing::instrument(skip(self), fields(platform = %self.platform))]
    pub fn load(&self, library_name: &str) -> Result<LoadedLibrary, NativeResourceError> {
        if let Some(value) = self.config.userlib_for(self.runtime, library_name) {
            info!("userlib for '{}' detected: {}", library_name, value);
            return self.load_override(library_name, &value);
        }

        info!("Load lib: {} for platform {}", library_name, self.platform);
        let mut failed = Vec::new();

        for candidate in candidate_chain(library_name, &self.platform) {
            match self.attempt(&candidate) {
                Ok((module, staged)) => {
                    info!("Loaded {} via {}", library_name, candidate);
                    let origin = module.origin();
                    return Ok(LoadedLibrary {
                        module,
                        staged,
                        report: LoadReport {
                            library: library_name.to_string(),
                            platform: self.platform,
                            source: LoadSource::Chain { candidate },
                            origin,
                            failed,
                        },
                    });
                }
                Err(AttemptError::Deploy(e)) => {
                    warn!("{} aborted the load: {}", candidate, e);
                    return Err(e);
                }
                Err(AttemptError::Candidate(failure)) => {
                    warn!(
                        "{} failed{}: {}",
                        failure.candidate,
                        failure
                            .target
                            .as_ref()
                            .map(|t| format!(" [{}]", t))
                            .unwrap_or_default(),
                        failure.reason
                    );
                    failed.push(failure);
                }
            }
        }

        Err(NativeResourceError::Exhausted {
            library: library_name.to_string(),
            platform: self.platform,
            attempts: failed,
        })
    }

    /// The expert escape hatch: no staging, no fallback.
    fn load_override(
        &self,
        library_name: &str,
        value: &str,
    ) -> Result<LoadedLibrary, NativeResourceError> {
        let result = if value.eq_ignore_ascii_case(USERLIB_SYSTEM) {
            info!("Load '{}' via the system library path", library_name);
            self.native.load_system(system_name(library_name))
        } else {
            info!("Load userlib {} instead of '{}'", value, library_name);
            self.native.load_path(Path::new(value))
        };

        let module = result.map_err(|e| NativeResourceError::Override {
            value: value.to_string(),
            reason: e.to_string(),
        })?;
        let origin = module.origin();
        Ok(LoadedLibrary {
            module,
            staged: None,
            report: LoadReport {
                library: library_name.to_string(),
                platform: self.platform,
                source: LoadSource::Override {
                    value: value.to_string(),
                },
                origin,
                failed: Vec::new(),
            },
        })
    }

    fn attempt(
        &self,
        candidate: &Candidate,
    ) -> Result<(Box<dyn NativeModule>, Option<StagedFile>), AttemptError> {
        match candidate {
            Candidate::Bundled(name) => self
                .deploy_and_load(name)
                .map(|(module, staged)| (module, Some(staged))),
            Candidate::System(name) => {
                let failure = |e: LinkError| FailedAttempt {
                    candidate: candidate.to_string(),
                    target: Some(e.target.clone()),
                    reason: e.reason,
                };
                let module = self.native.load_system(name).map_err(failure)?;
                self.self_test(module.as_ref()).map_err(failure)?;
                Ok((module, None))
            }
        }
    }

    /// Locate, stage, copy, load and self-test one bundled variant.
    fn deploy_and_load(
        &self,
        name: &str,
    ) -> Result<(Box<dyn NativeModule>, StagedFile), AttemptError> {
        let staged = self.stage(name)?;
        if let Err(e) = self.runtime.delete_on_exit(&staged.file_path) {
            debug!("Cannot register {:?} for exit cleanup: {:#}", staged.file_path, e);
        }

        let target = absolute(&staged.file_path);
        let target_str = target.display().to_string();
        let fail = |reason: String| FailedAttempt {
            candidate: Candidate::Bundled(name.to_string()).to_string(),
            target: Some(target_str.clone()),
            reason,
        };

        let module = self.native.load_path(&target).map_err(|e| fail(e.reason))?;
        self.self_test(module.as_ref()).map_err(|e| fail(e.reason))?;
        Ok((module, staged))
    }

    /// Extract the bundled library `name` into a fresh staging slot.
    ///
    /// The staged file is left in place; only [`Loader::load`] registers it
    /// for removal at exit. A missing or unreadable resource is a
    /// [`AttemptError::Candidate`]; exhausted staging slots are
    /// [`AttemptError::Deploy`].
    pub fn stage(&self, name: &str) -> Result<StagedFile, AttemptError> {
        let fail = |target: Option<String>, reason: String| FailedAttempt {
            candidate: Candidate::Bundled(name.to_string()).to_string(),
            target,
            reason,
        };

        let resource = resource::locate(self.bundle, name, &self.platform)
            .map_err(|e| fail(None, format!("{:#}", e)))?
            .ok_or_else(|| {
                let path = resource::resource_path(name, &self.platform);
                let reason = match &path {
                    Some(_) => format!("not found in {}", self.bundle.describe()),
                    None => format!("no prebuilt library for platform {}", self.platform),
                };
                fail(path, reason)
            })?;

        let mut reader = resource.reader;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| fail(Some(resource.path.clone()), format!("read failed: {}", e)))?;
        match inspect::describe(&bytes) {
            Ok(info) => debug!("{} is {}", resource.path, info),
            Err(e) => warn!("{} does not look like a native library: {:#}", resource.path, e),
        }

        let staging =
            StagingArea::new(self.runtime, &self.config.temp_dir, self.platform.extension());
        let staged = staging.prepare(name).map_err(AttemptError::Deploy)?;

        info!("Copy resources to: {}", staged.file_path.display());
        self.copy_bytes(&bytes, &staged.file_path).map_err(|e| {
            fail(
                Some(staged.file_path.display().to_string()),
                format!("copy failed: {:#}", e),
            )
        })?;
        Ok(staged)
    }

    fn copy_bytes(&self, bytes: &[u8], path: &Path) -> anyhow::Result<()> {
        let mut writer = self.runtime.create_file(path)?;
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Resolve the designated entry point; a link failure here counts as a
    /// failed load.
    fn self_test(&self, module: &dyn NativeModule) -> Result<(), LinkError> {
        debug!(
            "Self-test: resolving {} in {}",
            self.config.self_test_symbol,
            module.origin()
        );
        module.resolve(&self.config.self_test_symbol)
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
