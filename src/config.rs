//! Loader configuration derived from the process environment.

use log::debug;
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Overrides the directory staging slots are created in
pub const TMPDIR_ENV: &str = "NRSERIAL_TMPDIR";
/// Path of the resource bundle (directory, `.zip` or `.jar`)
pub const BUNDLE_ENV: &str = "NRSERIAL_BUNDLE";
/// Overrides the symbol resolved to verify a freshly loaded library
pub const SELF_TEST_SYMBOL_ENV: &str = "NRSERIAL_SELF_TEST_SYMBOL";

/// Entry point that enumerates serial ports in the bundled drivers.
pub const DEFAULT_SELF_TEST_SYMBOL: &str = "Java_gnu_io_RXTXCommDriver_registerKnownPorts";

/// Value of the `userlib` override selecting the standard library search path
pub const USERLIB_SYSTEM: &str = "sys";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Explicit override: `sys` or an absolute library path. When unset the
    /// environment is consulted per library name, see [`userlib_from_env`].
    pub userlib: Option<String>,
    /// Parent directory of the staging slots
    pub temp_dir: PathBuf,
    pub bundle: Option<PathBuf>,
    pub self_test_symbol: String,
}

impl LoaderConfig {
    pub fn from_runtime<R: Runtime>(runtime: &R) -> Self {
        let temp_dir = match non_empty_env(runtime, TMPDIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let dir = runtime.temp_dir();
                if dir.as_os_str().is_empty() {
                    PathBuf::from("tmp")
                } else {
                    dir
                }
            }
        };

        let bundle = non_empty_env(runtime, BUNDLE_ENV).map(PathBuf::from);
        let self_test_symbol = non_empty_env(runtime, SELF_TEST_SYMBOL_ENV)
            .unwrap_or_else(|| DEFAULT_SELF_TEST_SYMBOL.to_string());

        debug!(
            "Loader config: temp_dir={:?}, bundle={:?}, self_test_symbol={}",
            temp_dir, bundle, self_test_symbol
        );

        Self {
            userlib: None,
            temp_dir,
            bundle,
            self_test_symbol,
        }
    }

    /// The override for `library_name`: the explicit setting first, then the
    /// environment.
    pub fn userlib_for<R: Runtime>(&self, runtime: &R, library_name: &str) -> Option<String> {
        self.userlib
            .clone()
            .or_else(|| userlib_from_env(runtime, library_name))
    }
}

/// Look up `<library>.userlib`, then `<LIBRARY>_USERLIB` for shells that
/// cannot export names containing dots.
pub fn userlib_from_env<R: Runtime>(runtime: &R, library_name: &str) -> Option<String> {
    non_empty_env(runtime, &format!("{}.userlib", library_name))
        .or_else(|| non_empty_env(runtime, &userlib_env_name(library_name)))
}

/// `libNRJavaSerial` -> `LIBNRJAVASERIAL_USERLIB`
pub fn userlib_env_name(library_name: &str) -> String {
    let sanitized: String = library_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_USERLIB", sanitized)
}

fn non_empty_env<R: Runtime>(runtime: &R, key: &str) -> Option<String> {
    runtime.env_var(key).ok().filter(|value| !value.is_empty())
}
