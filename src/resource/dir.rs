use anyhow::{Context, Result};
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::{ResourceBundle, relative};

/// Bundle backed by an unpacked directory tree containing `native/...`.
pub struct DirBundle {
    root: PathBuf,
}

impl DirBundle {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ResourceBundle for DirBundle {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    fn open(&self, resource_path: &str) -> Result<Option<Box<dyn Read + Send>>> {
        let file_path = self.root.join(relative(resource_path));
        if !file_path.is_file() {
            debug!("No resource at {:?}", file_path);
            return Ok(None);
        }
        let file = File::open(&file_path)
            .with_context(|| format!("Failed to open resource {:?}", file_path))?;
        Ok(Some(Box::new(file)))
    }
}
