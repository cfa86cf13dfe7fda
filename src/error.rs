//! Error types surfaced by the loader.

use serde::Serialize;
use std::fmt;

use crate::platform::PlatformTag;

/// A single failed attempt to link a native library.
///
/// These are expected while walking the candidate chain and are never surfaced
/// on their own; they end up in [`NativeResourceError::Exhausted`] diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkError {
    /// What was being loaded (absolute path or bare library name)
    pub target: String,
    pub reason: String,
}

impl LinkError {
    pub fn new(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to link {}: {}", self.target, self.reason)
    }
}

impl std::error::Error for LinkError {}

/// Record of one candidate strategy that did not produce a working library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAttempt {
    /// Human readable strategy, e.g. "bundled libNRJavaSerial" or "system rxtxSerial"
    pub candidate: String,
    /// Path or name handed to the native loader, if the attempt got that far
    pub target: Option<String>,
    pub reason: String,
}

/// Irrecoverable failure to bring up native serial support.
#[derive(Debug, Clone)]
pub enum NativeResourceError {
    /// No staging slot could be provisioned
    Deploy { file_name: String, reason: String },
    /// Every candidate in the fallback chain failed
    Exhausted {
        library: String,
        platform: PlatformTag,
        attempts: Vec<FailedAttempt>,
    },
    /// The user-supplied override could not be loaded
    Override { value: String, reason: String },
    /// An earlier load attempt through the same gate failed
    PreviouslyFailed(String),
}

impl fmt::Display for NativeResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeResourceError::Deploy { file_name, reason } => {
                write!(f, "Unable to deploy native resource {}: {}", file_name, reason)
            }
            NativeResourceError::Exhausted {
                library,
                platform,
                attempts,
            } => {
                write!(
                    f,
                    "Unable to load deployed native resource {} for platform {}",
                    library, platform
                )?;
                for attempt in attempts {
                    write!(f, "\n  - {}", attempt.candidate)?;
                    if let Some(target) = &attempt.target {
                        write!(f, " [{}]", target)?;
                    }
                    write!(f, ": {}", attempt.reason)?;
                }
                if let Some(last) = attempts.iter().rev().find_map(|a| a.target.as_ref()) {
                    write!(f, "\nLast path attempted: {}", last)?;
                }
                Ok(())
            }
            NativeResourceError::Override { value, reason } => {
                write!(
                    f,
                    "Unable to load native resource from given path '{}': {}",
                    value, reason
                )
            }
            NativeResourceError::PreviouslyFailed(msg) => {
                write!(f, "Native library failed to load earlier in this process: {}", msg)
            }
        }
    }
}

impl std::error::Error for NativeResourceError {}
