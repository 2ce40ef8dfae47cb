//! File-system abstraction used by the persistent scopes
//!
//! Absent files are not errors: [`Storage::read_to_string`] returns `None`
//! and [`Storage::remove`] on a missing file succeeds.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Byte-level storage backing scope files
#[cfg_attr(test, mockall::automock)]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Read a whole file; `None` if it does not exist
    ///
    /// # Errors
    /// Returns error for I/O failures other than a missing file
    fn read_to_string(&self, path: &Path) -> io::Result<Option<String>>;

    /// Replace a file's contents, creating parent directories as needed
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    fn write_atomic(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Check if a file or directory exists
    fn exists(&self, path: &Path) -> bool;

    /// Delete a file; deleting a missing file succeeds
    ///
    /// # Errors
    /// Returns error if an existing file cannot be deleted
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Entry names of a directory; empty if it does not exist
    ///
    /// # Errors
    /// Returns error if an existing directory cannot be read
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Create a directory and its parents
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// [`Storage`] over the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl LocalStorage {
    /// Create local storage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Storage for LocalStorage {
    fn read_to_string(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let temp = path.with_file_name(format!(".{file_name}.tmp"));

        let mut file = fs::File::create(&temp)?;
        file.write_all(contents.as_bytes())?;
        if let Err(err) = file.sync_all() {
            tracing::debug!(path = %temp.display(), error = %err, "fsync failed");
        }
        drop(file);

        if let Err(err) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(err);
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut names = Vec::new();
        for entry in entries {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}
