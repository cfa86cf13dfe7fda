//! Bundled native resources.
//!
//! Prebuilt drivers ship inside the application package under
//! `/native/<platform>/<library><extension>`. The package itself is abstracted
//! as a [`ResourceBundle`] so it can be an unpacked directory, a zip/jar
//! archive, or bytes compiled into the binary.

mod dir;
mod embedded;
mod zip;

use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::io::Read;
use std::path::Path;

use crate::config::LoaderConfig;
use crate::platform::PlatformTag;

pub use dir::DirBundle;
pub use embedded::EmbeddedBundle;
pub use zip::ZipBundle;

/// A read-only package of native resources addressed by absolute resource paths.
#[cfg_attr(test, mockall::automock)]
pub trait ResourceBundle: Send + Sync {
    /// Short description used in log messages and diagnostics
    fn describe(&self) -> String;

    /// Open the resource at `resource_path` (e.g. `/native/osx/libFoo.jnilib`).
    /// Returns `Ok(None)` when the bundle has no such resource.
    fn open(&self, resource_path: &str) -> Result<Option<Box<dyn Read + Send>>>;
}

/// An opened bundled resource together with the path it was found under.
pub struct Resource {
    pub path: String,
    pub reader: Box<dyn Read + Send>,
}

/// Compose the in-package path of `name` for the given platform.
///
/// Returns `None` for platforms without prebuilt libraries.
pub fn resource_path(name: &str, platform: &PlatformTag) -> Option<String> {
    let subpath = platform.subpath()?;
    Some(format!("/native/{}/{}{}", subpath, name, platform.extension()))
}

/// Locate the platform specific resource for `name` inside `bundle`.
///
/// Unsupported platforms and missing resources yield `Ok(None)`; the caller's
/// fallback chain decides what to do next.
#[tracing::instrument(skip(bundle))]
pub fn locate(
    bundle: &dyn ResourceBundle,
    name: &str,
    platform: &PlatformTag,
) -> Result<Option<Resource>> {
    let Some(path) = resource_path(name, platform) else {
        warn!(
            "Can't load native file: {}{} for platform {}",
            name,
            platform.extension(),
            platform
        );
        return Ok(None);
    };

    info!("Loading from resource: {} in {}", path, bundle.describe());
    Ok(bundle
        .open(&path)?
        .map(|reader| Resource { path, reader }))
}

/// Open a bundle from disk: `.zip`/`.jar` archives become a [`ZipBundle`],
/// directories a [`DirBundle`].
pub fn open_bundle(path: &Path) -> Result<Box<dyn ResourceBundle>> {
    if ZipBundle::can_handle(path) {
        return Ok(Box::new(ZipBundle::open(path)?));
    }
    if path.is_dir() {
        return Ok(Box::new(DirBundle::new(path)));
    }
    Err(anyhow!(
        "Unsupported resource bundle: {} (expected a directory, .zip or .jar)",
        path.display()
    ))
}

/// Bundle used when the caller does not supply one: the configured bundle,
/// else the executable's directory when it ships a `native/` tree, else an
/// empty bundle that leaves only the system library path.
pub fn default_bundle(config: &LoaderConfig) -> Box<dyn ResourceBundle> {
    if let Some(path) = &config.bundle {
        match open_bundle(path) {
            Ok(bundle) => return bundle,
            Err(e) => warn!("Ignoring resource bundle {:?}: {:#}", path, e),
        }
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    if let Some(dir) = exe_dir.filter(|dir| dir.join("native").is_dir()) {
        debug!("Using resources next to the executable: {:?}", dir);
        return Box::new(DirBundle::new(dir));
    }

    warn!("No resource bundle found, only the system library path will be searched");
    Box::new(EmbeddedBundle::new())
}

/// Turn an absolute resource path into the relative form used inside archives
/// and directories.
pub(crate) fn relative(resource_path: &str) -> &str {
    resource_path.trim_start_matches('/')
}
