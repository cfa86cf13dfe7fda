//! Environment and system information operations.

use std::env;
use std::path::PathBuf;

use super::RealRuntime;

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_var_impl(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn os_name_impl(&self) -> String {
        jvm_os_name(env::consts::OS).to_string()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn os_arch_impl(&self) -> String {
        jvm_os_arch(env::consts::ARCH).to_string()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn user_name_impl(&self) -> Option<String> {
        #[cfg(unix)]
        {
            if let Ok(Some(user)) = nix::unistd::User::from_uid(nix::unistd::getuid()) {
                return Some(user.name);
            }
        }

        env::var("USER")
            .or_else(|_| env::var("USERNAME"))
            .ok()
            .filter(|name| !name.is_empty())
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn temp_dir_impl(&self) -> PathBuf {
        env::temp_dir()
    }
}

/// Map a Rust target OS name onto the name a JVM would report for it.
fn jvm_os_name(os: &str) -> &str {
    match os {
        "linux" => "Linux",
        "macos" => "Mac OS X",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        "solaris" => "SunOS",
        other => other,
    }
}

/// Map a Rust target architecture onto the `os.arch` string a JVM would report.
fn jvm_os_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "x86",
        "powerpc" => "ppc",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
        "powerpc64" => "ppc64",
        other => other,
    }
}
