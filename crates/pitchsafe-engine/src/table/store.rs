// File-backed feature table with a single-writer lock.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use fs4::fs_std::FileExt;
use tracing::debug;

use super::{FeatureTable, TableError};

/// Distinguishes temp files written by concurrent saves in one process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Feature table stored as one text file.
///
/// Every read-modify-write goes through [`FileTableStore::update`], which
/// holds the writer lock from load to save so concurrent outings cannot
/// overwrite each other's rows. The lock has two layers: a mutex for
/// threads sharing this store, and an exclusive advisory lock on the
/// sibling `<table>.lock` file for every other store and process writing
/// the same table.
pub struct FileTableStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole table. A missing file is reported as
    /// [`TableError::Missing`] before anything is read.
    pub fn load(&self) -> Result<FeatureTable, TableError> {
        if !self.path.is_file() {
            return Err(TableError::Missing {
                path: self.path.clone(),
            });
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| TableError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        FeatureTable::parse(&text)
    }

    /// Replace the stored table. Writes a sibling temp file and renames it
    /// over the original so readers never see a half-written table.
    pub fn save(&self, table: &FeatureTable) -> Result<(), TableError> {
        let _guard = self.lock();
        let _file_lock = self.lock_file()?;
        self.write_unlocked(table)
    }

    /// Load, mutate and save the table under the writer lock.
    ///
    /// Nothing is written if `f` returns an error.
    pub fn update<T, F>(&self, f: F) -> Result<T, TableError>
    where
        F: FnOnce(&mut FeatureTable) -> Result<T, TableError>,
    {
        if !self.path.is_file() {
            return Err(TableError::Missing {
                path: self.path.clone(),
            });
        }
        let _guard = self.lock();
        let _file_lock = self.lock_file()?;
        let mut table = self.load()?;
        let out = f(&mut table)?;
        self.write_unlocked(&table)?;
        Ok(out)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state.
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until this process holds the table's advisory lock. Released
    /// when the returned handle is dropped.
    fn lock_file(&self) -> Result<File, TableError> {
        let path = self.sibling(".lock");
        let lock_err = |e| TableError::Lock {
            path: path.clone(),
            source: e,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;
        Ok(file)
    }

    fn write_unlocked(&self, table: &FeatureTable) -> Result<(), TableError> {
        let tmp = self.temp_path();
        let write_err = |e| TableError::Write {
            path: self.path.clone(),
            source: e,
        };
        std::fs::write(&tmp, table.to_text()).map_err(write_err)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(write_err(e));
        }
        debug!(path = %self.path.display(), rows = table.row_count(), "feature table saved");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.sibling(&format!(".{}.{seq}.tmp", std::process::id()))
    }

    /// `<table file name><suffix>` in the table's directory.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }
}
