/*
 * This module provides the text-file capability the library store and tag registry persist
 * through. It defines `PersistenceError`, a trait `FileStoreOperations` for abstracting reads and
 * writes (so tests can count writes or inject failures), and the concrete `CoreFileStore`.
 *
 * Writes go to a sibling temporary file that is then renamed over the destination, so a failed
 * write never leaves a truncated library or tag file behind.
 */
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum PersistenceError {
    Io(io::Error),
    Serde(serde_json::Error),
    InvalidPath(PathBuf),
}

impl From<io::Error> for PersistenceError {
    fn from(err: io::Error) -> Self {
        PersistenceError::Io(err)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serde(err)
    }
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "I/O error: {e}"),
            PersistenceError::Serde(e) => write!(f, "Serialization/Deserialization error: {e}"),
            PersistenceError::InvalidPath(p) => write!(f, "Invalid path: {p:?}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Io(e) => Some(e),
            PersistenceError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

pub trait FileStoreOperations: Send + Sync {
    /*
     * Reads the whole file as UTF-8 text. A file that does not exist is reported as
     * `Ok(None)` rather than an error, since callers treat it as "nothing saved yet".
     */
    fn read_text(&self, path: &Path) -> Result<Option<String>>;

    /*
     * Replaces the file's contents, creating missing parent directories first.
     */
    fn write_text(&self, path: &Path, contents: &str) -> Result<()>;
}

pub struct CoreFileStore {}

impl CoreFileStore {
    pub fn new() -> Self {
        CoreFileStore {}
    }

    fn temp_path_for(path: &Path) -> Result<PathBuf> {
        let file_name = path
            .file_name()
            .ok_or_else(|| PersistenceError::InvalidPath(path.to_path_buf()))?;
        let mut temp_name = file_name.to_os_string();
        temp_name.push(".tmp");
        Ok(path.with_file_name(temp_name))
    }
}

impl Default for CoreFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStoreOperations for CoreFileStore {
    fn read_text(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                log::trace!("CoreFileStore: Read {} bytes from {path:?}.", contents.len());
                Ok(Some(contents))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("CoreFileStore: {path:?} does not exist yet.");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
            log::debug!("CoreFileStore: Created directory {parent:?}.");
        }

        let temp_path = Self::temp_path_for(path)?;
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, path)?;
        log::trace!("CoreFileStore: Wrote {} bytes to {path:?}.", contents.len());
        Ok(())
    }
}
