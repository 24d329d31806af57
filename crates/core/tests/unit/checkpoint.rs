//! # Checkpoint Tests
//!
//! Save/restore determinism, last-write-wins replacement, backup, all-or-nothing
//! behavior on every failure path, and how a restore interacts with an attached trace.

use std::io;

use pretty_assertions::assert_eq;
use simdrive_core::checkpoint::{CHECKPOINT_FORMAT, CHECKPOINT_VERSION, Checkpoint};
use simdrive_core::common::{CheckpointError, Phase, SimError, SimulationClock, StoreError};
use simdrive_core::model::{CounterConfig, CounterTop};
use simdrive_core::store::{FileStore, MemoryStore, SnapshotStore};
use simdrive_core::waveform::SessionState;
use simdrive_core::{CheckpointManager, Model, RunResult, StopReason, TraceSession};

use crate::common::harness::{
    TestContext, counter_driver, memory_traced_driver, record_ticks, records, take_trace,
};
use crate::common::mocks::{MockHandle, MockStore};

/// Counter with both finish and fault disabled and a non-default history depth.
fn config() -> CounterConfig {
    CounterConfig {
        history_depth: 8,
        ..CounterConfig::default()
    }
}

#[test]
fn test_restore_reproduces_subsequent_trace() {
    let ctx = TestContext::new();
    let mut manager = CheckpointManager::new(ctx.store());

    let mut original = memory_traced_driver(config());
    let _ = original.run(Some(40)).unwrap();
    original.save_checkpoint(&mut manager, "mid").unwrap();
    let _ = take_trace(&mut original);
    original.attach_trace(TraceSession::new(Vec::new())).unwrap();
    let _ = original.run(Some(90)).unwrap();
    let expected = take_trace(&mut original);

    let mut resumed = memory_traced_driver(config());
    resumed.restore_checkpoint(&mut manager, "mid").unwrap();
    assert_eq!(resumed.clock(), original_clock_at(40));
    let _ = resumed.run(Some(90)).unwrap();
    let actual = take_trace(&mut resumed);

    assert_eq!(records(&actual), records(&expected));
    assert_eq!(record_ticks(&actual), (40..90).collect::<Vec<u64>>());
    assert_eq!(resumed.model().count(), original.model().count());
    assert_eq!(resumed.model().history(), original.model().history());
}

/// Clock position after `ticks` ticks from a fresh start.
fn original_clock_at(ticks: u64) -> SimulationClock {
    let phase = if ticks % 2 == 1 {
        Phase::Rising
    } else {
        Phase::Falling
    };
    SimulationClock::at(ticks, phase)
}

#[test]
fn test_save_replaces_previous_checkpoint() {
    let store = MemoryStore::new();
    let mut manager = CheckpointManager::new(store.clone());
    let mut driver = counter_driver(config());

    let _ = driver.run(Some(10)).unwrap();
    driver.save_checkpoint(&mut manager, "snap").unwrap();
    let first = store.get("snap").unwrap();
    let _ = driver.run(Some(20)).unwrap();
    driver.save_checkpoint(&mut manager, "snap").unwrap();

    assert_eq!(store.names(), vec!["snap".to_string()]);
    assert_ne!(store.get("snap").unwrap(), first);

    let mut fresh = counter_driver(config());
    fresh.restore_checkpoint(&mut manager, "snap").unwrap();
    assert_eq!(fresh.clock().tick(), 20);
}

#[test]
fn test_payload_carries_format_and_clock() {
    let store = MemoryStore::new();
    let mut manager = CheckpointManager::new(store.clone());
    let mut driver = counter_driver(config());
    let _ = driver.run(Some(13)).unwrap();
    driver.save_checkpoint(&mut manager, "snap").unwrap();

    let value: serde_json::Value = serde_json::from_slice(&store.get("snap").unwrap()).unwrap();
    assert_eq!(value["format"], CHECKPOINT_FORMAT);
    assert_eq!(value["version"], CHECKPOINT_VERSION);
    assert_eq!(value["tick"], 13);
    assert_eq!(value["phase"], "rising");
}

#[test]
fn test_staging_is_cleared_after_save() {
    let mut manager = CheckpointManager::new(MemoryStore::new());
    let mut driver = counter_driver(config());
    driver.save_checkpoint(&mut manager, "a").unwrap();
    driver.save_checkpoint(&mut manager, "b").unwrap();
    let store = manager.into_store();
    assert_eq!(store.names(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_uncreatable_destination_leaves_no_file() {
    let ctx = TestContext::new();
    let mut manager = CheckpointManager::new(FileStore::new(ctx.path("missing")));
    let mut driver = counter_driver(config());
    let _ = driver.run(Some(5)).unwrap();

    let err = driver.save_checkpoint(&mut manager, "snap").unwrap_err();
    assert!(matches!(
        err,
        SimError::Checkpoint(CheckpointError::DestinationUnavailable { .. })
    ));
    assert!(!ctx.path("missing").exists());
    assert_eq!(ctx.entries(), 0);
    assert_eq!(driver.stats().checkpoints_saved, 0);
}

#[test]
fn test_failed_commit_is_destination_unavailable() {
    let mut store = MockStore::new();
    let _ = store.expect_open().times(1).returning(|_, _| {
        let mut handle = MockHandle::new();
        let _ = handle.expect_write_all().returning(|_| Ok(()));
        let _ = handle
            .expect_close()
            .returning(|| Err(StoreError::Io(io::Error::other("disk full"))));
        Ok(handle)
    });
    let mut manager = CheckpointManager::new(store);
    let model = CounterTop::new(config());

    let err = manager
        .save(&model, &SimulationClock::new(), "snap")
        .unwrap_err();
    match err {
        CheckpointError::DestinationUnavailable {
            destination,
            source,
        } => {
            assert_eq!(destination, "snap");
            assert!(matches!(source, StoreError::Io(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_mid_step_model_cannot_be_saved() {
    let store = MemoryStore::new();
    let mut manager = CheckpointManager::new(store.clone());
    let mut driver = counter_driver(config());
    let _ = driver.run(Some(12)).unwrap();
    driver.model_mut().set_enable(false);

    let err = driver.save_checkpoint(&mut manager, "snap").unwrap_err();
    assert!(matches!(
        err,
        SimError::Checkpoint(CheckpointError::SerializationFailed { .. })
    ));
    assert!(store.is_empty());
}

#[test]
fn test_missing_source() {
    let mut manager = CheckpointManager::new(MemoryStore::new());
    let mut driver = counter_driver(config());
    let err = driver.restore_checkpoint(&mut manager, "absent").unwrap_err();
    assert!(matches!(
        err,
        SimError::Checkpoint(CheckpointError::SourceNotFound { .. })
    ));
}

#[test]
fn test_corrupt_payload_leaves_model_untouched() {
    let store = MemoryStore::new();
    store.insert("garbage", b"{ not json".to_vec());
    store.insert(
        "foreign",
        br#"{"format":"other","version":1,"tick":3,"phase":"rising","model":{}}"#.to_vec(),
    );
    let mut manager = CheckpointManager::new(store);

    let mut driver = counter_driver(config());
    let _ = driver.run(Some(30)).unwrap();
    let before = driver.model().export_state().unwrap();
    let clock = driver.clock();

    for name in ["garbage", "foreign"] {
        let err = driver.restore_checkpoint(&mut manager, name).unwrap_err();
        assert!(matches!(
            err,
            SimError::Checkpoint(CheckpointError::CorruptPayload { .. })
        ));
        assert_eq!(driver.model().export_state().unwrap(), before);
        assert_eq!(driver.clock(), clock);
    }
}

#[test]
fn test_future_version_is_rejected() {
    let checkpoint = Checkpoint {
        identifier: "snap".to_string(),
        payload: format!(
            r#"{{"format":"{CHECKPOINT_FORMAT}","version":{},"tick":0,"phase":"falling","model":null}}"#,
            CHECKPOINT_VERSION + 1
        )
        .into_bytes(),
    };
    let err = checkpoint.decode::<Option<u8>>().unwrap_err();
    assert!(matches!(err, CheckpointError::CorruptPayload { .. }));
}

#[test]
fn test_shape_mismatch_leaves_model_untouched() {
    let mut manager = CheckpointManager::new(MemoryStore::new());
    let mut small = counter_driver(config());
    let _ = small.run(Some(20)).unwrap();
    small.save_checkpoint(&mut manager, "small").unwrap();

    let mut large = counter_driver(CounterConfig::default());
    let err = large.restore_checkpoint(&mut manager, "small").unwrap_err();
    assert!(matches!(
        err,
        SimError::Checkpoint(CheckpointError::CorruptPayload { .. })
    ));
    assert_eq!(large.clock(), SimulationClock::new());
    assert_eq!(large.model().count(), 0);
    assert_eq!(large.stats().checkpoints_restored, 0);
}

#[test]
fn test_restore_clears_recorded_fault() {
    let mut manager = CheckpointManager::new(MemoryStore::new());
    let poisoned = CounterConfig {
        fault_at: Some(3),
        ..config()
    };
    let mut driver = counter_driver(poisoned);
    let _ = driver.run(Some(12)).unwrap();
    driver.save_checkpoint(&mut manager, "before").unwrap();
    assert!(driver.run(Some(40)).is_err());

    driver.restore_checkpoint(&mut manager, "before").unwrap();
    let result = driver.run(Some(14)).unwrap();
    assert_eq!(result.stopped_at, 14);
}

#[test]
fn test_backup_copies_bytes() {
    let ctx = TestContext::new();
    let mut manager = CheckpointManager::new(ctx.store());
    let mut driver = counter_driver(config());
    let _ = driver.run(Some(25)).unwrap();
    driver.save_checkpoint(&mut manager, "snap").unwrap();

    let copied = manager.backup("snap", "snap.bak").unwrap();
    let original = std::fs::read(ctx.path("snap")).unwrap();
    assert_eq!(copied, original.len());
    assert_eq!(std::fs::read(ctx.path("snap.bak")).unwrap(), original);

    let mut restored = counter_driver(config());
    restored.restore_checkpoint(&mut manager, "snap.bak").unwrap();
    assert_eq!(restored.clock().tick(), 25);
    assert!(manager.store().contains("snap.bak"));
}

#[test]
fn test_backup_of_missing_source() {
    let mut manager = CheckpointManager::new(MemoryStore::new());
    let err = manager.backup("absent", "copy").unwrap_err();
    assert!(matches!(err, CheckpointError::SourceNotFound { .. }));
    assert!(!manager.store().contains("copy"));
}

/// Re-encodes a saved payload with its clock moved to `tick`.
fn with_tick(payload: &[u8], tick: u64) -> Vec<u8> {
    let mut value: serde_json::Value = serde_json::from_slice(payload).unwrap();
    value["tick"] = serde_json::json!(tick);
    serde_json::to_vec(&value).unwrap()
}

#[test]
fn test_exhausted_tick_counter_is_rejected() {
    let store = MemoryStore::new();
    let mut manager = CheckpointManager::new(store.clone());
    let mut driver = counter_driver(config());
    let _ = driver.run(Some(12)).unwrap();
    driver.save_checkpoint(&mut manager, "snap").unwrap();
    let saved = store.get("snap").unwrap();
    store.insert("end", with_tick(&saved, u64::MAX));
    store.insert("last", with_tick(&saved, u64::MAX - 1));

    let mut fresh = counter_driver(config());
    let err = fresh.restore_checkpoint(&mut manager, "end").unwrap_err();
    assert!(matches!(
        err,
        SimError::Checkpoint(CheckpointError::CorruptPayload { .. })
    ));
    assert_eq!(fresh.clock(), SimulationClock::new());

    fresh.restore_checkpoint(&mut manager, "last").unwrap();
    let result = fresh.run(None).unwrap();
    assert_eq!(
        result,
        RunResult {
            stopped_at: u64::MAX,
            reason: StopReason::LimitReached,
            ticks_executed: 1,
        }
    );
}

#[test]
fn test_restore_behind_trace_closes_it() {
    let mut manager = CheckpointManager::new(MemoryStore::new());
    let mut driver = memory_traced_driver(config());
    let _ = driver.run(Some(10)).unwrap();
    driver.save_checkpoint(&mut manager, "t10").unwrap();
    let _ = driver.run(Some(30)).unwrap();

    driver.restore_checkpoint(&mut manager, "t10").unwrap();
    assert_eq!(
        driver.trace().map(TraceSession::state),
        Some(SessionState::Closed)
    );

    let result = driver.run(Some(20)).unwrap();
    assert_eq!(result.ticks_executed, 10);
    assert_eq!(driver.stats().trace_records, 30);
    let first = take_trace(&mut driver);
    assert_eq!(record_ticks(&first), (0..30).collect::<Vec<u64>>());

    driver.attach_trace(TraceSession::new(Vec::new())).unwrap();
    let _ = driver.run(Some(25)).unwrap();
    let second = take_trace(&mut driver);
    assert_eq!(record_ticks(&second), (20..25).collect::<Vec<u64>>());
}

#[test]
fn test_restore_ahead_of_trace_keeps_recording() {
    let mut manager = CheckpointManager::new(MemoryStore::new());
    let mut ahead = counter_driver(config());
    let _ = ahead.run(Some(30)).unwrap();
    ahead.save_checkpoint(&mut manager, "t30").unwrap();

    let mut driver = memory_traced_driver(config());
    let _ = driver.run(Some(10)).unwrap();
    driver.restore_checkpoint(&mut manager, "t30").unwrap();
    assert_eq!(
        driver.trace().map(TraceSession::state),
        Some(SessionState::Open)
    );

    let _ = driver.run(Some(35)).unwrap();
    let expected: Vec<u64> = (0..10).chain(30..35).collect();
    assert_eq!(record_ticks(&take_trace(&mut driver)), expected);
}

#[test]
fn test_checkpoint_failures_leave_trace_recording() {
    let ctx = TestContext::new();
    let mut unavailable = CheckpointManager::new(FileStore::new(ctx.path("missing")));
    let store = MemoryStore::new();
    store.insert("garbage", b"{ not json".to_vec());
    let mut corrupt = CheckpointManager::new(store);

    let mut driver = memory_traced_driver(config());
    let _ = driver.run(Some(15)).unwrap();

    let err = driver.save_checkpoint(&mut unavailable, "snap").unwrap_err();
    assert!(matches!(
        err,
        SimError::Checkpoint(CheckpointError::DestinationUnavailable { .. })
    ));
    let err = driver.restore_checkpoint(&mut corrupt, "garbage").unwrap_err();
    assert!(matches!(
        err,
        SimError::Checkpoint(CheckpointError::CorruptPayload { .. })
    ));
    assert_eq!(
        driver.trace().map(TraceSession::state),
        Some(SessionState::Open)
    );

    let _ = driver.run(Some(25)).unwrap();
    assert_eq!(driver.stats().trace_records, 25);
    assert_eq!(
        record_ticks(&take_trace(&mut driver)),
        (0..25).collect::<Vec<u64>>()
    );
}
