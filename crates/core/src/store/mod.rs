//! Snapshot stores.
//!
//! A snapshot store is a durable byte store keyed by name. This module provides:
//! 1. **Contract:** [`SnapshotStore`] opens named entries; [`StoreHandle`] reads, writes, and closes them.
//! 2. **Transfer:** [`transfer`] copies the entire contents of one handle into another.
//! 3. **Implementations:** [`FileStore`] on a directory and [`MemoryStore`] in process memory.
//!
//! Write handles are single-writer and last-write-wins: opening for write discards nothing
//! until [`StoreHandle::close`] commits, and the new contents then replace the old entry
//! entirely. A write handle dropped without a successful close leaves the entry untouched.

/// Directory-backed store.
pub mod file;
/// In-process store.
pub mod memory;

pub use file::{FileHandle, FileStore};
pub use memory::{MemoryHandle, MemoryStore};

use std::path::{Component, Path};

use crate::common::StoreError;

/// Access mode requested when opening an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Read the committed contents.
    Read,
    /// Replace the contents on close.
    Write,
}

/// Open handle onto one store entry.
pub trait StoreHandle {
    /// Mode the handle was opened with.
    fn mode(&self) -> OpenMode;

    /// Appends `bytes` to the contents pending for this write handle.
    ///
    /// # Errors
    ///
    /// [`StoreError::WrongMode`] on a read handle, [`StoreError::Closed`] after close,
    /// or [`StoreError::Io`] if the backing medium fails.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), StoreError>;

    /// Returns the entire committed contents of the entry.
    ///
    /// # Errors
    ///
    /// [`StoreError::WrongMode`] on a write handle, [`StoreError::Closed`] after close,
    /// or [`StoreError::Io`] if the backing medium fails.
    fn read_all(&mut self) -> Result<Vec<u8>, StoreError>;

    /// Releases the handle, committing pending writes. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if committing a write fails; the entry is then left as it was.
    fn close(&mut self) -> Result<(), StoreError>;

    /// Returns `true` once the handle has been closed.
    fn is_closed(&self) -> bool;
}

/// Durable byte store keyed by name.
pub trait SnapshotStore {
    /// Handle type returned by [`SnapshotStore::open`].
    type Handle: StoreHandle;

    /// Opens `name` for reading or writing. Writing creates the entry if absent.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when reading a missing entry, [`StoreError::InvalidName`]
    /// for an empty name, or [`StoreError::Unavailable`] if the entry cannot be opened.
    fn open(&mut self, name: &str, mode: OpenMode) -> Result<Self::Handle, StoreError>;

    /// Returns `true` if a committed entry exists under `name`.
    fn contains(&self, name: &str) -> bool;
}

/// Copies the entire contents of `src` into `dst`.
///
/// The destination is not closed; the caller commits it with [`StoreHandle::close`].
///
/// # Errors
///
/// Propagates the first read or write failure.
pub fn transfer<S, D>(src: &mut S, dst: &mut D) -> Result<usize, StoreError>
where
    S: StoreHandle + ?Sized,
    D: StoreHandle + ?Sized,
{
    let bytes = src.read_all()?;
    dst.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Rejects blank names and names that would resolve outside the store root.
fn check_name(name: &str) -> Result<(), StoreError> {
    let escapes = Path::new(name).components().any(|part| {
        matches!(
            part,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if name.trim().is_empty() || escapes {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
