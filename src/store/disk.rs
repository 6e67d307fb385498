use crate::constants::{BACKUP_EXTENSION, TEMP_EXTENSION};
use crate::error::AppError;
use crate::safe_lock;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::DatasetKind;

/// Where a loaded dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Default,
}

#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub data: T,
    pub source: LoadSource,
}

/// File access for the data directory. Every read and write holds the I/O lock.
#[derive(Debug, Clone)]
pub(super) struct Disk {
    dir: PathBuf,
    max_bytes: usize,
    io_lock: Arc<Mutex<()>>,
}

fn with_extension_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

impl Disk {
    pub(super) fn new(dir: &Path, max_bytes: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            max_bytes,
            io_lock: Arc::new(Mutex::new(())),
        }
    }

    pub(super) fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub(super) fn primary_path(&self, kind: DatasetKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    pub(super) fn backup_path(&self, kind: DatasetKind) -> PathBuf {
        with_extension_suffix(&self.primary_path(kind), BACKUP_EXTENSION)
    }

    /// Load `kind`: primary file, then its backup, then the default.
    pub(super) fn read<T: DeserializeOwned + Default>(&self, kind: DatasetKind) -> Loaded<T> {
        let _guard = safe_lock(&self.io_lock, "store I/O");

        let primary = self.primary_path(kind);
        match self.read_file(kind, &primary) {
            Ok(Some(data)) => {
                return Loaded {
                    data,
                    source: LoadSource::Primary,
                }
            }
            Ok(None) => debug!("No {} data at {}", kind.label(), primary.display()),
            Err(e) => warn!("Could not load {}: {e}", primary.display()),
        }

        let backup = self.backup_path(kind);
        match self.read_file(kind, &backup) {
            Ok(Some(data)) => {
                info!("Recovered {} data from {}", kind.label(), backup.display());
                return Loaded {
                    data,
                    source: LoadSource::Backup,
                };
            }
            Ok(None) => {}
            Err(e) => warn!("Could not load {}: {e}", backup.display()),
        }

        Loaded {
            data: T::default(),
            source: LoadSource::Default,
        }
    }

    fn read_file<T: DeserializeOwned>(&self, kind: DatasetKind, path: &Path) -> Result<Option<T>, AppError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.max_bytes {
            return Err(AppError::Capacity {
                dataset: kind.label(),
                size,
                limit: self.max_bytes,
            });
        }
        let bytes = fs::read(path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Replace the primary file with `bytes` via a temporary sibling.
    pub(super) fn write(&self, kind: DatasetKind, bytes: &[u8]) -> Result<(), AppError> {
        let _guard = safe_lock(&self.io_lock, "store I/O");
        fs::create_dir_all(&self.dir)?;
        let primary = self.primary_path(kind);
        let tmp = with_extension_suffix(&primary, TEMP_EXTENSION);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &primary)?;
        Ok(())
    }

    pub(super) fn write_backup(&self, kind: DatasetKind, bytes: &[u8]) -> Result<(), AppError> {
        let _guard = safe_lock(&self.io_lock, "store I/O");
        fs::create_dir_all(&self.dir)?;
        fs::write(self.backup_path(kind), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::UsageLedger;
    use tempfile::tempdir;

    #[test]
    fn test_backup_path_appends_extension() {
        let disk = Disk::new(Path::new("/data"), 1024);
        assert_eq!(
            disk.backup_path(DatasetKind::Usage),
            PathBuf::from("/data/app_usage.json.backup")
        );
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let disk = Disk::new(dir.path(), 1024);
        disk.write(DatasetKind::Timer, b"{}").unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["timer_data.json".to_string()]);
    }

    #[test]
    fn test_oversize_file_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let disk = Disk::new(dir.path(), 16);
        fs::write(disk.primary_path(DatasetKind::Usage), vec![b' '; 64]).unwrap();

        let loaded: Loaded<UsageLedger> = disk.read(DatasetKind::Usage);
        assert_eq!(loaded.source, LoadSource::Default);
        assert!(loaded.data.is_empty());
    }
}
