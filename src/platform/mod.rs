//! Platform identification.
//!
//! Classifies the free-form OS name and architecture strings reported by the
//! runtime into a [`PlatformTag`], which decides where the bundled native
//! library lives and which file extension it carries.

use serde::Serialize;
use std::fmt;

use crate::runtime::Runtime;

/// Environment variable overriding the reported OS name
pub const OS_NAME_ENV: &str = "NRSERIAL_OS_NAME";
/// Environment variable overriding the reported OS architecture
pub const OS_ARCH_ENV: &str = "NRSERIAL_OS_ARCH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Windows,
    Osx,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bitness {
    #[serde(rename = "32")]
    Bits32,
    #[serde(rename = "64")]
    Bits64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CpuArch {
    #[serde(rename = "x86")]
    X86,
    #[serde(rename = "ARM")]
    Arm,
    #[serde(rename = "PPC")]
    Ppc,
    #[serde(rename = "other")]
    Other,
}

#[derive(Debug, Clone, Copy)]
enum Match {
    Prefix,
    Contains,
}

/// One row of a classification table. Patterns are lowercase and matched
/// against the lowercased input.
struct Rule<T> {
    pattern: &'static str,
    how: Match,
    value: T,
}

impl<T> Rule<T> {
    fn matches(&self, input: &str) -> bool {
        match self.how {
            Match::Prefix => input.starts_with(self.pattern),
            Match::Contains => input.contains(self.pattern),
        }
    }
}

const fn prefix<T>(pattern: &'static str, value: T) -> Rule<T> {
    Rule {
        pattern,
        how: Match::Prefix,
        value,
    }
}

const fn contains<T>(pattern: &'static str, value: T) -> Rule<T> {
    Rule {
        pattern,
        how: Match::Contains,
        value,
    }
}

const FAMILY_RULES: &[Rule<OsFamily>] = &[
    prefix("windows", OsFamily::Windows),
    prefix("microsoft", OsFamily::Windows),
    prefix("ms", OsFamily::Windows),
    prefix("linux", OsFamily::Linux),
    prefix("mac", OsFamily::Osx),
];

// First match wins: ARM is checked before PPC.
const ARCH_RULES: &[Rule<CpuArch>] = &[
    prefix("arm", CpuArch::Arm),
    contains("ppc", CpuArch::Ppc),
    prefix("x86", CpuArch::X86),
    prefix("amd64", CpuArch::X86),
    prefix("i386", CpuArch::X86),
    prefix("i486", CpuArch::X86),
    prefix("i586", CpuArch::X86),
    prefix("i686", CpuArch::X86),
];

const BITNESS_RULES: &[Rule<Bitness>] = &[
    prefix("x86_64", Bitness::Bits64),
    prefix("amd64", Bitness::Bits64),
];

fn classify<T: Copy>(rules: &[Rule<T>], input: &str, fallback: T) -> T {
    let input = input.trim().to_lowercase();
    rules
        .iter()
        .find(|rule| rule.matches(&input))
        .map(|rule| rule.value)
        .unwrap_or(fallback)
}

/// Canonical description of the platform the process runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformTag {
    pub family: OsFamily,
    pub bits: Bitness,
    pub arch: CpuArch,
}

impl PlatformTag {
    /// Classify an OS name and architecture string.
    pub fn classify(os_name: &str, os_arch: &str) -> Self {
        Self {
            family: classify(FAMILY_RULES, os_name, OsFamily::Other),
            bits: classify(BITNESS_RULES, os_arch, Bitness::Bits32),
            arch: classify(ARCH_RULES, os_arch, CpuArch::Other),
        }
    }

    /// Detect the platform of the current process.
    ///
    /// `NRSERIAL_OS_NAME` and `NRSERIAL_OS_ARCH` take precedence over what the
    /// runtime reports unless they are empty.
    pub fn detect<R: Runtime>(runtime: &R) -> Self {
        let os_name = runtime
            .env_var(OS_NAME_ENV)
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| runtime.os_name());
        let os_arch = runtime
            .env_var(OS_ARCH_ENV)
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| runtime.os_arch());
        let tag = Self::classify(&os_name, &os_arch);
        log::debug!("Platform '{}' / '{}' classified as {}", os_name, os_arch, tag);
        tag
    }

    /// Native library file extension for this platform, empty when unknown.
    pub fn extension(&self) -> &'static str {
        match self.family {
            OsFamily::Windows => ".dll",
            OsFamily::Linux => ".so",
            OsFamily::Osx => ".jnilib",
            OsFamily::Other => "",
        }
    }

    /// Directory under `/native` holding this platform's prebuilt libraries.
    pub fn subpath(&self) -> Option<&'static str> {
        match (self.family, self.arch, self.bits) {
            (OsFamily::Osx, _, _) => Some("osx"),
            (OsFamily::Windows, _, Bitness::Bits64) => Some("windows/x86_64"),
            (OsFamily::Windows, _, Bitness::Bits32) => Some("windows/x86_32"),
            (OsFamily::Linux, CpuArch::Arm, _) => Some("linux/ARM"),
            (OsFamily::Linux, CpuArch::Ppc, _) => Some("linux/PPC"),
            (OsFamily::Linux, _, Bitness::Bits64) => Some("linux/x86_64"),
            (OsFamily::Linux, _, Bitness::Bits32) => Some("linux/x86_32"),
            (OsFamily::Other, _, _) => None,
        }
    }

    pub fn is_unix_like(&self) -> bool {
        matches!(self.family, OsFamily::Linux | OsFamily::Osx)
    }

    pub fn is_arm(&self) -> bool {
        self.arch == CpuArch::Arm
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subpath() {
            Some(subpath) => f.write_str(subpath),
            None => {
                let bits = match self.bits {
                    Bitness::Bits32 => 32,
                    Bitness::Bits64 => 64,
                };
                write!(f, "unsupported ({:?}, {:?}, {}-bit)", self.family, self.arch, bits)
            }
        }
    }
}
