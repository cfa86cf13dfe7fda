//! The ordered chain of strategies tried when loading a native library.

use serde::Serialize;
use std::fmt;

use crate::platform::PlatformTag;

/// Compatibility name of the upstream RXTX driver, tried as a last resort.
pub const ALIAS_LIBRARY: &str = "rxtxSerial";

/// ABI variants shipped for ARM boards, most specific first.
const ARM_SUFFIXES: [&str; 5] = ["v5", "v6_HF", "v6", "_HF", ""];

const LEGACY_SUFFIX: &str = "_legacy";

/// One way of obtaining the native library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", content = "name", rename_all = "lowercase")]
pub enum Candidate {
    /// Extract `/native/<platform>/<name><ext>` from the bundle and load the staged copy
    Bundled(String),
    /// Ask the platform's standard search path for the bare library name
    System(String),
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Bundled(name) => write!(f, "bundled {}", name),
            Candidate::System(name) => write!(f, "system {}", name),
        }
    }
}

/// Bare name for the standard search path: `libNRJavaSerial` -> `NRJavaSerial`.
pub fn system_name(library_name: &str) -> &str {
    library_name.strip_prefix("lib").unwrap_or(library_name)
}

/// Library names tried from the bundle before any fallback.
pub fn bundled_variants(library_name: &str, platform: &PlatformTag) -> Vec<String> {
    if platform.is_arm() {
        ARM_SUFFIXES
            .iter()
            .map(|suffix| format!("{}{}", library_name, suffix))
            .collect()
    } else {
        vec![library_name.to_string()]
    }
}

/// The full chain for `library_name` on `platform`, in the order it is tried.
pub fn candidate_chain(library_name: &str, platform: &PlatformTag) -> Vec<Candidate> {
    let mut chain: Vec<Candidate> = bundled_variants(library_name, platform)
        .into_iter()
        .map(Candidate::Bundled)
        .collect();

    // No legacy builds exist for Windows
    if platform.is_unix_like() {
        chain.push(Candidate::Bundled(format!(
            "{}{}",
            library_name, LEGACY_SUFFIX
        )));
    }

    chain.push(Candidate::System(system_name(library_name).to_string()));
    if system_name(library_name) != ALIAS_LIBRARY {
        chain.push(Candidate::System(ALIAS_LIBRARY.to_string()));
    }
    chain
}
