use anyhow::{Context, Result, anyhow};
use log::debug;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zip::ZipArchive;
use zip::result::ZipError;

use super::{ResourceBundle, relative};

/// Bundle backed by a zip or jar archive, the way applications usually ship.
pub struct ZipBundle {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
}

impl ZipBundle {
    pub fn can_handle(path: &Path) -> bool {
        let name = path.to_string_lossy().to_lowercase();
        name.ends_with(".zip") || name.ends_with(".jar")
    }

    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening resource archive {:?}", path);
        let file =
            File::open(path).with_context(|| format!("Failed to open archive at {:?}", path))?;
        let archive = ZipArchive::new(file)
            .with_context(|| format!("Failed to parse ZIP archive {:?}", path))?;
        Ok(Self {
            path: path.to_path_buf(),
            archive: Mutex::new(archive),
        })
    }
}

impl ResourceBundle for ZipBundle {
    fn describe(&self) -> String {
        format!("archive {}", self.path.display())
    }

    fn open(&self, resource_path: &str) -> Result<Option<Box<dyn Read + Send>>> {
        let mut archive = self
            .archive
            .lock()
            .map_err(|_| anyhow!("archive {:?} is poisoned", self.path))?;

        let mut entry = match archive.by_name(relative(resource_path)) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                debug!("No entry {} in {:?}", resource_path, self.path);
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {} from {:?}", resource_path, self.path));
            }
        };

        // Entries borrow the archive, so hand out an owned copy of the bytes.
        // The header's size is not trusted for preallocation.
        let mut buffer = Vec::new();
        entry
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to extract {} from {:?}", resource_path, self.path))?;
        Ok(Some(Box::new(Cursor::new(buffer))))
    }
}
