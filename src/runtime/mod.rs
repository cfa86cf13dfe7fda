//! Runtime abstraction for system operations.
//!
//! This module provides a trait-based abstraction over the operating system
//! services the loader touches, enabling dependency injection and testability.
//!
//! # Structure
//!
//! - `env` - Environment variables and system information (OS name, arch, user, temp dir)
//! - `fs` - File system operations used while staging native libraries

mod env;
mod fs;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;

    /// Operating system name in the JVM vocabulary ("Linux", "Mac OS X", "Windows", ...).
    fn os_name(&self) -> String;

    /// CPU architecture in the JVM vocabulary ("amd64", "x86", "arm", "ppc64", ...).
    fn os_arch(&self) -> String;

    /// Account name of the user running the process, if it can be determined.
    fn user_name(&self) -> Option<String>;

    fn temp_dir(&self) -> PathBuf;

    // File System
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> Result<()>;

    /// Create a new, empty file. Fails if the file already exists.
    fn create_new_file(&self, path: &Path) -> Result<()>;

    /// Open a file for writing, truncating any existing content.
    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>>;
    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>>;

    /// Whether the file at `path` can be opened for reading.
    fn is_readable(&self, path: &Path) -> bool;

    /// Register a path for best-effort removal when the process exits.
    fn delete_on_exit(&self, path: &Path) -> Result<()>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn os_name(&self) -> String {
        self.os_name_impl()
    }

    fn os_arch(&self) -> String {
        self.os_arch_impl()
    }

    fn user_name(&self) -> Option<String> {
        self.user_name_impl()
    }

    fn temp_dir(&self) -> PathBuf {
        self.temp_dir_impl()
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.remove_file_impl(path)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        self.remove_dir_impl(path)
    }

    fn create_new_file(&self, path: &Path) -> Result<()> {
        self.create_new_file_impl(path)
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn std::io::Write + Send>> {
        self.create_file_impl(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn std::io::Read + Send>> {
        self.open_impl(path)
    }

    fn is_readable(&self, path: &Path) -> bool {
        self.is_readable_impl(path)
    }

    fn delete_on_exit(&self, path: &Path) -> Result<()> {
        self.delete_on_exit_impl(path)
    }
}
