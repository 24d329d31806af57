//! Directory-backed snapshot store.
//!
//! Entry names are paths relative to the store root; absolute names and `..`
//! components are rejected.
//! Writes go to a temporary file in the destination directory and are renamed over the
//! target on close, so a reader never observes a partially written entry and a failed
//! or abandoned write leaves no file behind.

use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{OpenMode, SnapshotStore, StoreHandle, check_name};
use crate::common::StoreError;

/// Snapshot store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `root`. The directory is not created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a store rooted at the current working directory.
    pub fn cwd() -> Self {
        Self::new(".")
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path an entry name resolves to.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl SnapshotStore for FileStore {
    type Handle = FileHandle;

    fn open(&mut self, name: &str, mode: OpenMode) -> Result<FileHandle, StoreError> {
        check_name(name)?;
        let path = self.path_of(name);
        let state = match mode {
            OpenMode::Read => {
                let file = File::open(&path).map_err(|source| match source.kind() {
                    io::ErrorKind::NotFound => StoreError::NotFound {
                        name: name.to_string(),
                    },
                    _ => StoreError::Unavailable {
                        name: name.to_string(),
                        source,
                    },
                })?;
                HandleState::Reading(file)
            }
            OpenMode::Write => {
                let dir = match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                if path.is_dir() {
                    return Err(StoreError::Unavailable {
                        name: name.to_string(),
                        source: io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "destination is a directory",
                        ),
                    });
                }
                let temp = NamedTempFile::new_in(&dir).map_err(|source| {
                    StoreError::Unavailable {
                        name: name.to_string(),
                        source,
                    }
                })?;
                HandleState::Writing { temp, target: path }
            }
        };
        tracing::debug!(name, ?mode, "opened file snapshot");
        Ok(FileHandle {
            name: name.to_string(),
            mode,
            state,
        })
    }

    fn contains(&self, name: &str) -> bool {
        !name.trim().is_empty() && self.path_of(name).is_file()
    }
}

#[derive(Debug)]
enum HandleState {
    Reading(File),
    Writing { temp: NamedTempFile, target: PathBuf },
    Closed,
}

/// Open entry of a [`FileStore`].
#[derive(Debug)]
pub struct FileHandle {
    name: String,
    mode: OpenMode,
    state: HandleState,
}

impl FileHandle {
    /// Entry name the handle was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl StoreHandle for FileHandle {
    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        match &mut self.state {
            HandleState::Writing { temp, .. } => Ok(temp.write_all(bytes)?),
            HandleState::Reading(_) => Err(StoreError::WrongMode {
                opened: OpenMode::Read,
                requested: OpenMode::Write,
            }),
            HandleState::Closed => Err(StoreError::Closed),
        }
    }

    fn read_all(&mut self) -> Result<Vec<u8>, StoreError> {
        match &mut self.state {
            HandleState::Reading(file) => {
                file.rewind()?;
                let mut bytes = Vec::new();
                let _ = file.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            HandleState::Writing { .. } => Err(StoreError::WrongMode {
                opened: OpenMode::Write,
                requested: OpenMode::Read,
            }),
            HandleState::Closed => Err(StoreError::Closed),
        }
    }

    fn close(&mut self) -> Result<(), StoreError> {
        match std::mem::replace(&mut self.state, HandleState::Closed) {
            HandleState::Writing { mut temp, target } => {
                temp.as_file_mut().flush()?;
                temp.as_file().sync_all()?;
                let _ = temp.persist(&target).map_err(|e| StoreError::Io(e.error))?;
                tracing::debug!(name = %self.name, path = %target.display(), "committed file snapshot");
                Ok(())
            }
            HandleState::Reading(_) | HandleState::Closed => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        matches!(self.state, HandleState::Closed)
    }
}

