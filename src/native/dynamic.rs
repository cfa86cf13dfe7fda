//! `libloading` backed implementation of the native loading primitives.

use libloading::Library;
use log::{debug, info};
use std::path::Path;

use super::{NativeLoader, NativeModule};
use crate::error::LinkError;

/// A shared library opened with `libloading`. Dropping it unloads the library,
/// so loaded modules are kept alive for as long as the caller needs them.
pub struct DynamicLibrary {
    library: Library,
    origin: String,
}

impl NativeModule for DynamicLibrary {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn resolve(&self, symbol: &str) -> Result<(), LinkError> {
        // SAFETY: the symbol is only looked up, never called or dereferenced.
        let found = unsafe { self.library.get::<*const ()>(symbol.as_bytes()) };
        found
            .map(|_| ())
            .map_err(|e| LinkError::new(&self.origin, format!("missing symbol {}: {}", symbol, e)))
    }
}

/// Loads native libraries into the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicLoader;

impl NativeLoader for DynamicLoader {
    #[tracing::instrument(skip(self))]
    fn load_path(&self, path: &Path) -> Result<Box<dyn NativeModule>, LinkError> {
        let origin = path.display().to_string();
        if !path.is_absolute() {
            return Err(LinkError::new(origin, "expected an absolute library path"));
        }
        info!("Load resource from absolute path: {}", origin);

        // SAFETY: loading runs the library's initialisers; the bundled drivers
        // are trusted code shipped with the application.
        let library =
            unsafe { Library::new(path) }.map_err(|e| LinkError::new(&origin, e.to_string()))?;
        Ok(Box::new(DynamicLibrary { library, origin }))
    }

    #[tracing::instrument(skip(self))]
    fn load_system(&self, name: &str) -> Result<Box<dyn NativeModule>, LinkError> {
        let file_name = libloading::library_filename(name);
        debug!("Searching system library path for {:?}", file_name);

        // SAFETY: see `load_path`.
        let library = unsafe { Library::new(&file_name) }
            .map_err(|e| LinkError::new(name, e.to_string()))?;
        Ok(Box::new(DynamicLibrary {
            library,
            origin: file_name.to_string_lossy().into_owned(),
        }))
    }
}
