//! # Snapshot Store Tests
//!
//! Commit-on-close semantics of the file and in-memory stores, and `transfer`.

use std::io;

use rstest::rstest;
use simdrive_core::common::StoreError;
use simdrive_core::store::{
    FileStore, MemoryStore, OpenMode, SnapshotStore, StoreHandle, transfer,
};

use crate::common::harness::TestContext;
use crate::common::mocks::MockHandle;

/// Writes `bytes` to `name` and commits.
fn put<S: SnapshotStore>(store: &mut S, name: &str, bytes: &[u8]) {
    let mut handle = store.open(name, OpenMode::Write).unwrap();
    handle.write_all(bytes).unwrap();
    handle.close().unwrap();
}

/// Reads the committed contents of `name`.
fn get<S: SnapshotStore>(store: &mut S, name: &str) -> Vec<u8> {
    let mut handle = store.open(name, OpenMode::Read).unwrap();
    let bytes = handle.read_all().unwrap();
    handle.close().unwrap();
    bytes
}

#[test]
fn test_file_store_round_trip() {
    let ctx = TestContext::new();
    let mut store = ctx.store();
    put(&mut store, "snap", b"payload");
    assert!(store.contains("snap"));
    assert_eq!(get(&mut store, "snap"), b"payload");
}

#[test]
fn test_file_store_write_replaces_entirely() {
    let ctx = TestContext::new();
    let mut store = ctx.store();
    put(&mut store, "snap", b"a much longer first payload");
    put(&mut store, "snap", b"short");
    assert_eq!(get(&mut store, "snap"), b"short");
}

#[test]
fn test_file_store_uncommitted_write_is_invisible() {
    let ctx = TestContext::new();
    let mut store = ctx.store();
    let mut handle = store.open("snap", OpenMode::Write).unwrap();
    handle.write_all(b"partial").unwrap();
    assert!(!store.contains("snap"));
    handle.close().unwrap();
    assert!(store.contains("snap"));
}

#[test]
fn test_file_store_dropped_writer_leaves_nothing() {
    let ctx = TestContext::new();
    let mut store = ctx.store();
    {
        let mut handle = store.open("snap", OpenMode::Write).unwrap();
        handle.write_all(b"partial").unwrap();
    }
    assert!(!store.contains("snap"));
    assert_eq!(ctx.entries(), 0);
}

#[test]
fn test_file_store_dropped_writer_keeps_previous_contents() {
    let ctx = TestContext::new();
    let mut store = ctx.store();
    put(&mut store, "snap", b"old");
    {
        let mut handle = store.open("snap", OpenMode::Write).unwrap();
        handle.write_all(b"new").unwrap();
    }
    assert_eq!(get(&mut store, "snap"), b"old");
    assert_eq!(ctx.entries(), 1);
}

#[test]
fn test_file_store_missing_entry() {
    let ctx = TestContext::new();
    let mut store = ctx.store();
    let err = store.open("absent", OpenMode::Read).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn test_file_store_missing_directory() {
    let ctx = TestContext::new();
    let mut store = FileStore::new(ctx.path("missing"));
    let err = store.open("snap", OpenMode::Write).unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { .. }));
    assert!(!ctx.path("missing").exists());
}

#[test]
fn test_file_store_directory_target() {
    let ctx = TestContext::new();
    std::fs::create_dir(ctx.path("sub")).unwrap();
    let mut store = ctx.store();
    let err = store.open("sub", OpenMode::Write).unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { .. }));
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("../outside")]
#[case("nested/../../outside")]
#[case("/tmp/absolute")]
fn test_invalid_names_are_rejected(#[case] name: &str) {
    let ctx = TestContext::new();
    let mut files = ctx.store();
    let mut memory = MemoryStore::new();
    assert!(matches!(
        files.open(name, OpenMode::Write).unwrap_err(),
        StoreError::InvalidName { .. }
    ));
    assert!(matches!(
        memory.open(name, OpenMode::Write).unwrap_err(),
        StoreError::InvalidName { .. }
    ));
}

#[test]
fn test_file_handle_close_twice() {
    let ctx = TestContext::new();
    let mut store = ctx.store();
    let mut handle = store.open("snap", OpenMode::Write).unwrap();
    handle.write_all(b"once").unwrap();
    handle.close().unwrap();
    handle.close().unwrap();
    assert!(handle.is_closed());
    assert_eq!(get(&mut store, "snap"), b"once");
}

#[test]
fn test_file_handle_rejects_use_after_close() {
    let ctx = TestContext::new();
    let mut store = ctx.store();
    let mut handle = store.open("snap", OpenMode::Write).unwrap();
    handle.close().unwrap();
    assert!(matches!(
        handle.write_all(b"late").unwrap_err(),
        StoreError::Closed
    ));
}

#[test]
fn test_file_handle_rejects_wrong_mode() {
    let ctx = TestContext::new();
    let mut store = ctx.store();
    put(&mut store, "snap", b"x");
    let mut reader = store.open("snap", OpenMode::Read).unwrap();
    assert_eq!(reader.mode(), OpenMode::Read);
    assert!(matches!(
        reader.write_all(b"y").unwrap_err(),
        StoreError::WrongMode {
            opened: OpenMode::Read,
            requested: OpenMode::Write
        }
    ));
}

#[test]
fn test_memory_store_close_twice() {
    let mut store = MemoryStore::new();
    let mut handle = store.open("snap", OpenMode::Write).unwrap();
    handle.write_all(b"abc").unwrap();
    handle.close().unwrap();
    handle.close().unwrap();
    assert_eq!(store.get("snap").as_deref(), Some(&b"abc"[..]));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_memory_store_clones_share_entries() {
    let store = MemoryStore::new();
    let mut other = store.clone();
    put(&mut other, "snap", b"shared");
    assert_eq!(store.names(), vec!["snap".to_string()]);
}

#[test]
fn test_transfer_between_stores() {
    let ctx = TestContext::new();
    let mut memory = MemoryStore::new();
    let mut files = ctx.store();
    put(&mut memory, "snap", b"0123456789");

    let mut src = memory.open("snap", OpenMode::Read).unwrap();
    let mut dst = files.open("copy", OpenMode::Write).unwrap();
    assert_eq!(transfer(&mut src, &mut dst).unwrap(), 10);
    assert!(!files.contains("copy"));
    dst.close().unwrap();
    assert_eq!(get(&mut files, "copy"), b"0123456789");
}

#[test]
fn test_transfer_copies_all_bytes_without_closing() {
    let mut src = MockHandle::new();
    let _ = src
        .expect_read_all()
        .times(1)
        .returning(|| Ok(b"abc".to_vec()));

    let mut dst = MockHandle::new();
    let _ = dst.expect_write_all().times(1).returning(|bytes| {
        assert_eq!(bytes, b"abc");
        Ok(())
    });
    let _ = dst.expect_close().never();

    assert_eq!(transfer(&mut src, &mut dst).unwrap(), 3);
}

#[test]
fn test_transfer_stops_on_read_failure() {
    let mut src = MockHandle::new();
    let _ = src
        .expect_read_all()
        .returning(|| Err(StoreError::Io(io::Error::other("bad sector"))));

    let mut dst = MockHandle::new();
    let _ = dst.expect_write_all().never();

    assert!(matches!(
        transfer(&mut src, &mut dst).unwrap_err(),
        StoreError::Io(_)
    ));
}

#[test]
fn test_escaping_name_creates_nothing_outside_root() {
    let ctx = TestContext::new();
    std::fs::create_dir(ctx.path("root")).unwrap();
    let mut store = FileStore::new(ctx.path("root"));

    let err = store.open("../sibling", OpenMode::Write).unwrap_err();
    assert!(matches!(err, StoreError::InvalidName { .. }));
    assert!(!ctx.path("sibling").exists());

    put(&mut store, "nested.snap", b"ok");
    assert_eq!(get(&mut store, "nested.snap"), b"ok".to_vec());
}
