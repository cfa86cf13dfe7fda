//! Process-wide, once-only load gate.
//!
//! The whole deploy-and-load sequence runs under the gate's mutex, so a racing
//! thread never observes a half-finished load. The outcome is kept for the
//! lifetime of the gate: a loaded library stays mapped, and a failure is
//! re-raised to every later caller without running the sequence again.

use log::info;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::LoaderConfig;
use crate::error::NativeResourceError;
use crate::loader::{DEFAULT_LIBRARY, LoadReport, LoadedLibrary, Loader};
use crate::native::DynamicLoader;
use crate::resource::{self, ResourceBundle};
use crate::runtime::RealRuntime;

enum GateState {
    Idle,
    Loaded(LoadedLibrary),
    Failed(String),
}

pub struct LoadGate {
    state: Mutex<GateState>,
}

impl Default for LoadGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadGate {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // A panic during a load leaves the state untouched, so it is still valid
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `load` unless this gate has already been through a load attempt.
    ///
    /// The lock is held until `load` returns. A successful library is kept
    /// alive by the gate; a failure is remembered and returned as
    /// [`NativeResourceError::PreviouslyFailed`] on every later call.
    pub fn ensure_loaded_with<F>(&self, load: F) -> Result<(), NativeResourceError>
    where
        F: FnOnce() -> Result<LoadedLibrary, NativeResourceError>,
    {
        let mut state = self.lock();
        match &*state {
            GateState::Loaded(_) => return Ok(()),
            GateState::Failed(message) => {
                return Err(NativeResourceError::PreviouslyFailed(message.clone()));
            }
            GateState::Idle => {}
        }

        match load() {
            Ok(library) => {
                info!(
                    "Native library {} ready ({})",
                    library.report.library, library.report.origin
                );
                *state = GateState::Loaded(library);
                Ok(())
            }
            Err(e) => {
                *state = GateState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Load the default library from `bundle` with the real runtime.
    pub fn ensure_loaded_from(
        &self,
        bundle: &dyn ResourceBundle,
    ) -> Result<(), NativeResourceError> {
        self.ensure_loaded_with(|| {
            let runtime = RealRuntime;
            let config = LoaderConfig::from_runtime(&runtime);
            let loader = Loader::new(&runtime, bundle, &DynamicLoader, &config);
            loader.load(DEFAULT_LIBRARY)
        })
    }

    /// Load the default library from the configured bundle.
    ///
    /// The bundle is `NRSERIAL_BUNDLE` when set, otherwise the directory of the
    /// running executable when it contains a `native/` tree. Without either
    /// only the system library path can satisfy the load.
    pub fn ensure_loaded(&self) -> Result<(), NativeResourceError> {
        self.ensure_loaded_with(|| {
            let runtime = RealRuntime;
            let config = LoaderConfig::from_runtime(&runtime);
            let bundle = resource::default_bundle(&config);
            let loader = Loader::new(&runtime, bundle.as_ref(), &DynamicLoader, &config);
            loader.load(DEFAULT_LIBRARY)
        })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(&*self.lock(), GateState::Loaded(_))
    }

    /// Report of the successful load, if any.
    pub fn report(&self) -> Option<LoadReport> {
        match &*self.lock() {
            GateState::Loaded(library) => Some(library.report.clone()),
            _ => None,
        }
    }
}

static GLOBAL: LoadGate = LoadGate::new();

/// The gate shared by the whole process.
pub fn global() -> &'static LoadGate {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Candidate, LoadSource};
    use crate::native::{MockNativeLoader, MockNativeModule, NativeModule};
    use crate::platform::PlatformTag;
    use crate::resource::EmbeddedBundle;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::tempdir;

    fn loaded_library() -> LoadedLibrary {
        let mut module = MockNativeModule::new();
        module
            .expect_origin()
            .returning(|| "/tmp/libNRJavaSerial_alice_0/libNRJavaSerial.so".to_string());
        LoadedLibrary {
            module: Box::new(module),
            staged: None,
            report: LoadReport {
                library: DEFAULT_LIBRARY.to_string(),
                platform: PlatformTag::classify("Linux", "amd64"),
                source: LoadSource::Chain {
                    candidate: Candidate::Bundled(DEFAULT_LIBRARY.to_string()),
                },
                origin: "/tmp/libNRJavaSerial_alice_0/libNRJavaSerial.so".to_string(),
                failed: Vec::new(),
            },
        }
    }

    #[test]
    fn test_second_call_does_not_reload() {
        let gate = LoadGate::new();
        let attempts = AtomicUsize::new(0);
        let load = || -> Result<LoadedLibrary, NativeResourceError> {
            attempts.fetch_add(1, Ordering::SeqCst);
            Ok(loaded_library())
        };

        assert!(!gate.is_loaded());
        gate.ensure_loaded_with(load).unwrap();
        gate.ensure_loaded_with(load).unwrap();
        gate.ensure_loaded_with(load).unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(gate.is_loaded());
        assert_eq!(gate.report().unwrap().library, DEFAULT_LIBRARY);
    }

    #[test]
    fn test_concurrent_callers_load_once() {
        let gate = Arc::new(LoadGate::new());
        let attempts = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let attempts = Arc::clone(&attempts);
                thread::spawn(move || {
                    gate.ensure_loaded_with(|| {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(20));
                        Ok(loaded_library())
                    })
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(gate.is_loaded());
    }

    #[test]
    fn test_failure_is_remembered() {
        let gate = LoadGate::new();
        let attempts = AtomicUsize::new(0);

        let first = gate.ensure_loaded_with(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(NativeResourceError::Override {
                value: "/opt/missing.so".into(),
                reason: "no such file".into(),
            })
        });
        assert!(matches!(first, Err(NativeResourceError::Override { .. })));

        let second = gate.ensure_loaded_with(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Ok(loaded_library())
        });
        match second {
            Err(NativeResourceError::PreviouslyFailed(message)) => {
                assert!(message.contains("/opt/missing.so"));
            }
            other => panic!("expected PreviouslyFailed, got {:?}", other),
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!gate.is_loaded());
        assert!(gate.report().is_none());
    }

    #[test]
    fn test_fresh_gate_retries() {
        let failed = LoadGate::new();
        let _ = failed.ensure_loaded_with(|| {
            Err(NativeResourceError::PreviouslyFailed("boom".into()))
        });

        let retry = LoadGate::new();
        assert!(retry.ensure_loaded_with(|| Ok(loaded_library())).is_ok());
    }

    #[test]
    fn test_gate_runs_loader_chain_once() {
        let dir = tempdir().unwrap();
        let config = LoaderConfig {
            userlib: None,
            temp_dir: dir.path().to_path_buf(),
            bundle: None,
            self_test_symbol: "nr_selftest".to_string(),
        };
        let bundle = EmbeddedBundle::new().with(
            "/native/linux/x86_64/libFoo.so",
            b"\x7fELF driver".as_slice(),
        );
        let mut native = MockNativeLoader::new();
        native
            .expect_load_path()
            .withf(|path: &Path| path.is_absolute() && path.ends_with("libFoo.so"))
            .times(1)
            .returning(|path| {
                let origin = path.display().to_string();
                let mut module = MockNativeModule::new();
                module.expect_origin().returning(move || origin.clone());
                module.expect_resolve().returning(|_| Ok(()));
                let module: Box<dyn NativeModule> = Box::new(module);
                Ok(module)
            });

        let gate = LoadGate::new();
        let load = || {
            Loader::with_platform(
                &RealRuntime,
                &bundle,
                &native,
                &config,
                PlatformTag::classify("Linux", "amd64"),
            )
            .load("libFoo")
        };

        gate.ensure_loaded_with(load).unwrap();
        assert!(gate.is_loaded());
        let report = gate.report().unwrap();
        assert_eq!(report.library, "libFoo");
        assert!(report.origin.ends_with("libFoo.so"));
        assert!(report.failed.is_empty());

        // Second call is served by the gate; the strict mock rejects another load
        gate.ensure_loaded_with(load).unwrap();
        assert!(gate.is_loaded());
    }

    #[test]
    fn test_ensure_loaded_from_without_drivers_fails_once() {
        let gate = LoadGate::new();
        // An empty bundle leaves only the system search, which has no such driver
        let bundle = crate::resource::EmbeddedBundle::new();

        let first = gate.ensure_loaded_from(&bundle);
        assert!(first.is_err());
        assert!(matches!(
            gate.ensure_loaded_from(&bundle),
            Err(NativeResourceError::PreviouslyFailed(_))
        ));
    }
}
