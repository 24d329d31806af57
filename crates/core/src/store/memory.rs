//! In-process snapshot store.
//!
//! Used as the checkpoint staging area and as a store for tests. Clones share the same
//! entries, so a handle outlives the borrow of the store that opened it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{OpenMode, SnapshotStore, StoreHandle, check_name};
use crate::common::StoreError;

type Entries = Rc<RefCell<BTreeMap<String, Vec<u8>>>>;

/// Snapshot store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Entries,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the committed contents of `name`.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.borrow().get(name).cloned()
    }

    /// Replaces the committed contents of `name` directly.
    pub fn insert(&self, name: impl Into<String>, bytes: Vec<u8>) {
        let _ = self.entries.borrow_mut().insert(name.into(), bytes);
    }

    /// Removes `name`, returning its committed contents.
    pub fn remove(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.borrow_mut().remove(name)
    }

    /// Names of all committed entries, in order.
    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` if no entry has been committed.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl SnapshotStore for MemoryStore {
    type Handle = MemoryHandle;

    fn open(&mut self, name: &str, mode: OpenMode) -> Result<MemoryHandle, StoreError> {
        check_name(name)?;
        if mode == OpenMode::Read && !self.contains(name) {
            return Err(StoreError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(MemoryHandle {
            name: name.to_string(),
            mode,
            entries: Rc::clone(&self.entries),
            pending: Vec::new(),
            closed: false,
        })
    }

    fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }
}

/// Open entry of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryHandle {
    name: String,
    mode: OpenMode,
    entries: Entries,
    pending: Vec<u8>,
    closed: bool,
}

impl MemoryHandle {
    fn check(&self, requested: OpenMode) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if self.mode != requested {
            return Err(StoreError::WrongMode {
                opened: self.mode,
                requested,
            });
        }
        Ok(())
    }
}

impl StoreHandle for MemoryHandle {
    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        self.check(OpenMode::Write)?;
        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    fn read_all(&mut self) -> Result<Vec<u8>, StoreError> {
        self.check(OpenMode::Read)?;
        self.entries
            .borrow()
            .get(&self.name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                name: self.name.clone(),
            })
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.mode == OpenMode::Write {
            let bytes = std::mem::take(&mut self.pending);
            let _ = self.entries.borrow_mut().insert(self.name.clone(), bytes);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
