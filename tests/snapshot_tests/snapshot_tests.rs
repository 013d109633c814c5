//! Snapshot Tests
//!
//! Tests verify:
//! - dump → clear → load restores live state, hashes included
//! - Expired entries are never dumped, and are dropped if they expire before load
//! - Absolute expiry instants survive the round trip
//! - Missing snapshot / missing directory / corrupt content errors
//! - A failed load leaves the in-memory state untouched
//! - Concurrent dumps, reads and loads always see a complete snapshot

use std::collections::BTreeMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use stashkv::snapshot::{SnapshotReader, HEADER_SIZE};
use stashkv::{Config, Engine, KeyTtl, StoreError, Ttl, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .name("snap")
        .dump_dir(temp_dir.path())
        .build();
    (temp_dir, Engine::new(config))
}

fn nested_value() -> Value {
    let mut map = BTreeMap::new();
    map.insert("k".to_string(), Value::from("v"));
    Value::List(vec![
        Value::from("test"),
        Value::from(1),
        Value::from(2),
        Value::Map(map),
        Value::Bool(true),
        Value::Bytes(Bytes::from_static(b"\x00\xFF")),
    ])
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_dump_creates_snapshot_file() {
    let (temp, engine) = setup_temp_engine();

    engine.set("a", 1);
    engine.dump().unwrap();

    assert_eq!(engine.snapshot_path(), temp.path().join("snap.snap"));
    assert!(engine.snapshot_path().exists());
    // No temporary file left behind
    assert!(!temp.path().join("snap.snap.tmp").exists());
}

#[test]
fn test_dump_clear_load_restores_state() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("a", 1);
    engine.set("text", "hello");
    engine.set("no_expire", nested_value());
    engine.set("float", 2.5);
    engine.set_with_ttl("c", 3, Ttl::Seconds(300));
    engine.hset("p", "s1", "v1");
    engine.hset("p", "s2", Value::Null);

    engine.dump().unwrap();
    engine.clear();
    assert!(engine.is_empty());

    engine.load().unwrap();

    assert_eq!(engine.get("a"), Some(Value::Int(1)));
    assert_eq!(engine.get("text"), Some(Value::from("hello")));
    assert_eq!(engine.get("no_expire"), Some(nested_value()));
    assert_eq!(engine.get("float"), Some(Value::Float(2.5)));
    assert_eq!(engine.get("c"), Some(Value::Int(3)));
    assert_eq!(engine.hget("p", "s1"), Some(Value::from("v1")));
    assert_eq!(engine.hget("p", "s2"), Some(Value::Null));
    assert_eq!(engine.get_keys("*"), vec!["a", "c", "float", "no_expire", "text"]);
}

#[test]
fn test_load_preserves_absolute_expiry() {
    let (_temp, engine) = setup_temp_engine();

    engine.set_with_ttl("k", 1, Ttl::Seconds(100));
    engine.hset_with_ttl("h", "f", 1, Ttl::Seconds(100));
    engine.dump().unwrap();

    let data = SnapshotReader::read(engine.snapshot_path()).unwrap();
    let deadline = data.entries["k"].expires_at.unwrap();
    assert!(deadline > data.created_at);
    assert!(data.hashes["h"].expires_at.is_some());

    thread::sleep(Duration::from_millis(20));
    engine.load().unwrap();

    // The TTL keeps counting down from the original instant; it is not rebased
    match engine.ttl("k") {
        Some(KeyTtl::Remaining(left)) => assert!(left < Duration::from_secs(100)),
        other => panic!("unexpected ttl: {:?}", other),
    }
}

#[test]
fn test_dump_skips_expired_entries() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("live", 1);
    engine.set_with_ttl("dead", 2, Ttl::Seconds(0));
    engine.hset_with_ttl("dead_hash", "f", 3, Ttl::Seconds(-1));

    engine.dump().unwrap();

    let data = SnapshotReader::read(engine.snapshot_path()).unwrap();
    assert_eq!(data.entries.len(), 1);
    assert!(data.entries.contains_key("live"));
    assert!(data.hashes.is_empty());
}

#[test]
fn test_load_drops_entries_expired_since_dump() {
    let (_temp, engine) = setup_temp_engine();

    engine.set_with_ttl("short", 1, Ttl::Millis(40));
    engine.set("long", 2);
    engine.dump().unwrap();

    thread::sleep(Duration::from_millis(90));
    engine.load().unwrap();

    assert_eq!(engine.get_keys("*"), vec!["long"]);
}

#[test]
fn test_load_discards_unsaved_changes() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("saved", 1);
    engine.dump().unwrap();

    engine.set("unsaved", 2);
    engine.set("saved", 100);
    engine.load().unwrap();

    assert_eq!(engine.get("unsaved"), None);
    assert_eq!(engine.get("saved"), Some(Value::Int(1)));
}

#[test]
fn test_second_dump_replaces_first() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("a", 1);
    engine.dump().unwrap();
    engine.delete("a");
    engine.set("b", 2);
    engine.dump().unwrap();

    engine.clear();
    engine.load().unwrap();

    assert_eq!(engine.get_keys("*"), vec!["b"]);
}

#[test]
fn test_open_restores_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .name("restart")
        .dump_dir(temp_dir.path().join("nested"))
        .build();

    {
        let engine = Engine::open(config.clone()).unwrap();
        assert!(engine.is_empty());
        engine.incr_by("visits", 7).unwrap();
        engine.hset("cfg", "mode", "fast");
        engine.dump().unwrap();
    }

    let engine = Engine::open(config).unwrap();
    assert_eq!(engine.get("visits"), Some(Value::Int(7)));
    assert_eq!(engine.hget("cfg", "mode"), Some(Value::from("fast")));
}

#[test]
fn test_engines_with_different_names_share_directory() {
    let temp_dir = TempDir::new().unwrap();
    let build = |name: &str| {
        Engine::new(
            Config::builder()
                .name(name)
                .dump_dir(temp_dir.path())
                .sync_on_dump(false)
                .build(),
        )
    };

    let a = build("a");
    let b = build("b");
    a.set("k", "from a");
    b.set("k", "from b");
    a.dump().unwrap();
    b.dump().unwrap();

    a.clear();
    a.load().unwrap();
    assert_eq!(a.get("k"), Some(Value::from("from a")));
}

// =============================================================================
// Failure Mode Tests
// =============================================================================

#[test]
fn test_load_missing_snapshot() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("keep", 1);

    let err = engine.load().unwrap_err();
    assert!(matches!(err, StoreError::SnapshotNotFound(_)));
    assert_eq!(engine.get("keep"), Some(Value::Int(1)));
}

#[test]
fn test_dump_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .dump_dir(temp_dir.path().join("does/not/exist"))
        .build();
    let engine = Engine::new(config);

    engine.set("a", 1);

    let err = engine.dump().unwrap_err();
    assert!(matches!(err, StoreError::Persistence { .. }));
}

#[test]
fn test_load_corrupt_snapshot_keeps_state() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("a", 1);
    engine.dump().unwrap();

    // Flip a payload byte
    let path = engine.snapshot_path().to_path_buf();
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x55;
    fs::write(&path, bytes).unwrap();

    engine.clear();
    engine.set("current", 2);

    let err = engine.load().unwrap_err();
    assert!(matches!(err, StoreError::Deserialization(_)));
    assert_eq!(engine.get_keys("*"), vec!["current"]);
}

#[test]
fn test_load_truncated_snapshot() {
    let (_temp, engine) = setup_temp_engine();

    engine.set("a", "value");
    engine.dump().unwrap();

    let path = engine.snapshot_path().to_path_buf();
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..HEADER_SIZE + 1]).unwrap();

    assert!(matches!(engine.load(), Err(StoreError::Deserialization(_))));
    assert_eq!(engine.get("a"), Some(Value::from("value")));
}

#[test]
fn test_load_garbage_file() {
    let (_temp, engine) = setup_temp_engine();

    fs::write(engine.snapshot_path(), b"{\"a\": {\"value\": 1}}").unwrap();

    assert!(matches!(engine.load(), Err(StoreError::Deserialization(_))));
}

#[test]
fn test_load_empty_file() {
    let (_temp, engine) = setup_temp_engine();

    fs::write(engine.snapshot_path(), b"").unwrap();

    assert!(matches!(engine.load(), Err(StoreError::Deserialization(_))));
}

#[test]
fn test_open_with_corrupt_snapshot_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .name("broken")
        .dump_dir(temp_dir.path())
        .build();
    fs::write(config.snapshot_path(), b"SKVSnot really").unwrap();

    assert!(matches!(
        Engine::open(config),
        Err(StoreError::Deserialization(_))
    ));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_dumps_never_fail_or_tear() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .name("busy")
        .dump_dir(temp_dir.path())
        .sync_on_dump(false)
        .build();
    let engine = Arc::new(Engine::new(config));
    let big = "x".repeat(200 * 1024);
    engine.set("blob", big.as_str());
    engine.dump().unwrap();

    let done = Arc::new(AtomicBool::new(false));

    // Flip between a large and a tiny value so snapshot sizes differ
    let mutator = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut large = false;
            while !done.load(Ordering::Relaxed) {
                engine.set("blob", if large { big.as_str() } else { "y" });
                large = !large;
            }
        })
    };

    let checker = {
        let engine = Arc::clone(&engine);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut reads = 0;
            loop {
                let data = SnapshotReader::read(engine.snapshot_path()).unwrap();
                assert!(data.entries.contains_key("blob"));
                reads += 1;
                if done.load(Ordering::Relaxed) {
                    break reads;
                }
            }
        })
    };

    let dumpers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..100 {
                    engine.dump().unwrap();
                }
            })
        })
        .collect();

    for handle in dumpers {
        handle.join().unwrap();
    }
    done.store(true, Ordering::Relaxed);
    mutator.join().unwrap();
    assert!(checker.join().unwrap() > 0);

    assert!(!temp_dir.path().join("busy.snap.tmp").exists());
    engine.load().unwrap();
    assert!(engine.exists("blob"));
}

#[test]
fn test_load_alongside_dumps_sees_whole_snapshots() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    for i in 0..50 {
        engine.set(format!("k{}", i), i);
    }
    engine.dump().unwrap();

    let dumper = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..100 {
                engine.dump().unwrap();
            }
        })
    };

    for _ in 0..100 {
        engine.load().unwrap();
        assert_eq!(engine.len(), 50);
    }

    dumper.join().unwrap();
}
