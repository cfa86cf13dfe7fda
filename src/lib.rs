pub mod cleanup;
pub mod config;
pub mod error;
pub mod gate;
pub mod inspect;
pub mod loader;
pub mod native;
pub mod platform;
pub mod resource;
pub mod runtime;
pub mod staging;

pub use error::{LinkError, NativeResourceError};
pub use gate::LoadGate;
pub use loader::{DEFAULT_LIBRARY, LoadReport, LoadedLibrary, Loader};
pub use platform::PlatformTag;

/// Make sure the native serial driver is loaded into this process.
///
/// Idempotent and safe to call from several threads: the first caller runs
/// the deploy-and-load sequence, everyone else waits for and shares its
/// outcome.
pub fn ensure_loaded() -> Result<(), NativeResourceError> {
    gate::global().ensure_loaded()
}
