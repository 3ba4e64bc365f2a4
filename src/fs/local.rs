//! Local directory filesystem
//!
//! Maps the path of every location under a root directory. Scheme and
//! authority are ignored, so `hdfs://nn/x` and `/x` name the same file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::backend::FileSystem;
use super::errors::{FsError, FsResult};
use crate::location::DataLocation;

/// Fsyncs a directory so that renames into it survive a crash.
pub(crate) fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Filesystem rooted at a local directory
#[derive(Debug)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path backing `location`
    pub fn path_of(&self, location: &DataLocation) -> PathBuf {
        self.root.join(location.path().trim_start_matches('/'))
    }

    fn create_parent(path: &Path) -> FsResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl FileSystem for LocalFileSystem {
    fn write(&self, location: &DataLocation, data: &[u8]) -> FsResult<()> {
        let path = self.path_of(location);
        Self::create_parent(&path)?;
        let mut file = File::create(&path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    fn read(&self, location: &DataLocation) -> FsResult<Vec<u8>> {
        fs::read(self.path_of(location)).map_err(|e| match FsError::from(e) {
            FsError::NotFound(_) => FsError::NotFound(location.to_string()),
            other => other,
        })
    }

    fn exists(&self, location: &DataLocation) -> FsResult<bool> {
        Ok(self.path_of(location).exists())
    }

    fn list(&self, location: &DataLocation) -> FsResult<Vec<DataLocation>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.path_of(location))? {
            let entry = entry?;
            match entry.file_name().to_str() {
                Some(name) => names.push(name.to_string()),
                None => {
                    return Err(FsError::Io(format!(
                        "non UTF-8 entry under {}",
                        location
                    )))
                }
            }
        }
        names.sort();
        names
            .iter()
            .map(|name| location.join(name).map_err(|e| FsError::Io(e.to_string())))
            .collect()
    }

    fn delete(&self, location: &DataLocation, recursive: bool) -> FsResult<()> {
        let path = self.path_of(location);
        let meta = fs::metadata(&path).map_err(|e| match FsError::from(e) {
            FsError::NotFound(_) => FsError::NotFound(location.to_string()),
            other => other,
        })?;
        if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_dir(&path)?;
            }
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn rename(&self, from: &DataLocation, to: &DataLocation) -> FsResult<()> {
        let target = self.path_of(to);
        Self::create_parent(&target)?;
        fs::rename(self.path_of(from), &target)?;
        if let Some(parent) = target.parent() {
            if let Err(e) = sync_dir(parent) {
                warn!(dir = %parent.display(), error = %e, "directory fsync failed after rename");
            }
        }
        Ok(())
    }

    fn create_dir_all(&self, location: &DataLocation) -> FsResult<()> {
        fs::create_dir_all(self.path_of(location))?;
        Ok(())
    }
}
