//! Record store
//!
//! One [`RecordStore`] handles one kind of document at one location. The
//! dispatcher composes a status store and a result store per directory
//! rather than a single writer that knows about both.

use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::atomic;
use crate::error::{BootStageError, Result};
use crate::record::{ResultRecord, StatusRecord};

/// A JSON document kept under a fixed file name.
pub trait Record: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
}

impl Record for StatusRecord {
    const FILE_NAME: &'static str = "status.json";
}

impl Record for ResultRecord {
    const FILE_NAME: &'static str = "result.json";
}

/// Load a record from `path`.
///
/// A missing file yields an empty document.
///
/// # Errors
///
/// `DocumentCorrupt` if the file exists but does not parse.
pub fn load<R: Record>(path: &Path) -> Result<R> {
    Ok(load_existing(path)?.unwrap_or_default())
}

/// Load a record from `path`, or `None` if there is no file.
pub fn load_existing<R: Record>(path: &Path) -> Result<Option<R>> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|e| BootStageError::corrupt(path, e))
}

/// Write the full document to `path`, creating its directory if needed.
pub fn save<R: Record>(path: &Path, record: &R) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(record)?;
    json.push(b'\n');
    atomic::write_atomic(path, &json)?;
    Ok(())
}

/// Typed handle on `<dir>/<R::FILE_NAME>`.
#[derive(Debug, Clone)]
pub struct RecordStore<R> {
    path: PathBuf,
    _record: PhantomData<R>,
}

impl<R: Record> RecordStore<R> {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(R::FILE_NAME),
            _record: PhantomData,
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<R> {
        load(&self.path)
    }

    pub fn load_existing(&self) -> Result<Option<R>> {
        load_existing(&self.path)
    }

    pub fn save(&self, record: &R) -> Result<()> {
        save(&self.path, record)
    }

    /// Delete the document. Absence is not an error.
    pub fn remove(&self) -> Result<bool> {
        Ok(atomic::remove_if_exists(&self.path)?)
    }
}

pub type StatusStore = RecordStore<StatusRecord>;
pub type ResultStore = RecordStore<ResultRecord>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StageOutcome;
    use crate::stage::Stage;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_empty_document() {
        let dir = TempDir::new().unwrap();
        let store = StatusStore::in_dir(dir.path());
        assert!(!store.exists());
        assert_eq!(store.load().unwrap(), StatusRecord::default());
        assert!(store.load_existing().unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_document() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("status.json"), "old").unwrap();
        let err = StatusStore::in_dir(dir.path()).load().unwrap_err();
        assert!(matches!(err, BootStageError::DocumentCorrupt { .. }));
    }

    #[test]
    fn test_load_non_utf8_document_is_corrupt() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("status.json"), [0xff, 0xfe, b'{']).unwrap();
        let err = load::<StatusRecord>(&dir.path().join("status.json")).unwrap_err();
        assert!(matches!(err, BootStageError::DocumentCorrupt { .. }), "{err:?}");
    }

    #[test]
    fn test_load_unreadable_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        // a directory where the document should be
        fs::create_dir(dir.path().join("status.json")).unwrap();
        let err = StatusStore::in_dir(dir.path()).load().unwrap_err();
        assert!(matches!(err, BootStageError::Io(_)), "{err:?}");
    }

    #[test]
    fn test_save_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("var/lib/cloud/data");
        let store = StatusStore::in_dir(&data_dir);

        let mut status = StatusRecord::new();
        status.record(
            Stage::Init,
            StageOutcome {
                errors: vec!["boom".into()],
                ..Default::default()
            },
        );
        store.save(&status).unwrap();

        assert_eq!(store.path(), data_dir.join("status.json"));
        assert_eq!(store.load().unwrap(), status);
    }

    #[test]
    fn test_saved_document_ends_with_newline() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::in_dir(dir.path());
        store.save(&ResultRecord::default()).unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.ends_with("}\n"));
        assert!(raw.contains("\"v1\""));
    }

    #[test]
    fn test_remove_missing_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::in_dir(dir.path());
        assert!(!store.remove().unwrap());
        store.save(&ResultRecord::default()).unwrap();
        assert!(store.remove().unwrap());
        assert!(!store.exists());
    }
}
