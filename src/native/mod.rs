//! Native loading primitives.
//!
//! The loader never touches `dlopen`/`LoadLibrary` directly; it goes through
//! [`NativeLoader`] so the candidate chain can be exercised without real
//! shared objects.

mod dynamic;

use std::path::Path;

use crate::error::LinkError;

pub use dynamic::{DynamicLibrary, DynamicLoader};

/// A native module mapped into the process.
#[cfg_attr(test, mockall::automock)]
pub trait NativeModule: Send + Sync {
    /// Where the module came from: an absolute path or a bare library name
    fn origin(&self) -> String;

    /// Resolve an exported symbol, failing with a link error when it is absent.
    fn resolve(&self, symbol: &str) -> Result<(), LinkError>;
}

/// The process's native-module loader.
#[cfg_attr(test, mockall::automock)]
pub trait NativeLoader: Send + Sync {
    /// Load native code from an explicit absolute path.
    fn load_path(&self, path: &Path) -> Result<Box<dyn NativeModule>, LinkError>;

    /// Load native code by bare library name through the platform's standard
    /// search mechanism (`NRJavaSerial` -> `libNRJavaSerial.so` on Linux).
    fn load_system(&self, name: &str) -> Result<Box<dyn NativeModule>, LinkError>;
}
