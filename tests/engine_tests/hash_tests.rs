//! Tests for the hash extension
//!
//! Tests verify:
//! - hset/hget on parents and sub-keys
//! - Parent TTL is applied only when the parent is created
//! - hset_expire updates or removes the parent expiry
//! - hdelete/hclear never fail on absence

use std::thread;
use std::time::Duration;

use stashkv::{Config, Engine, KeyTtl, Ttl, Value};

fn setup_engine() -> Engine {
    Engine::new(Config::builder().name("hash-test").build())
}

fn remaining(ttl: Option<KeyTtl>) -> Duration {
    match ttl {
        Some(KeyTtl::Remaining(left)) => left,
        other => panic!("expected an expiring parent, got {:?}", other),
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_hset_hget() {
    let engine = setup_engine();

    engine.hset("p", "s1", "v1");

    assert_eq!(engine.hget("p", "s1"), Some(Value::from("v1")));
    assert_eq!(engine.hget("p", "missing"), None);
    assert_eq!(engine.hget("missing", "s1"), None);
}

#[test]
fn test_hset_overwrites_sub_key() {
    let engine = setup_engine();

    engine.hset("p", "s", 1);
    engine.hset("p", "s", 2);

    assert_eq!(engine.hget("p", "s"), Some(Value::Int(2)));
    assert_eq!(engine.hlen("p"), 1);
}

#[test]
fn test_hget_all_and_hkeys() {
    let engine = setup_engine();

    engine.hset("user:1", "name", "ada");
    engine.hset("user:1", "age", 36);

    let fields = engine.hget_all("user:1").unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields.get("age"), Some(&Value::Int(36)));

    assert_eq!(engine.hkeys("user:1"), vec!["age", "name"]);
    assert!(engine.hkeys("user:2").is_empty());
    assert_eq!(engine.hget_all("user:2"), None);
}

#[test]
fn test_hash_and_plain_namespaces_are_separate() {
    let engine = setup_engine();

    engine.set("shared", "plain");
    engine.hset("shared", "f", "hashed");

    assert_eq!(engine.get("shared"), Some(Value::from("plain")));
    assert_eq!(engine.hget("shared", "f"), Some(Value::from("hashed")));
}

// =============================================================================
// Parent Expiry Tests
// =============================================================================

#[test]
fn test_parent_ttl_set_on_creation() {
    let engine = setup_engine();

    engine.hset_with_ttl("p", "s1", "v1", Ttl::Seconds(100));

    let left = remaining(engine.hash_ttl("p"));
    assert!(left > Duration::from_secs(98));
}

#[test]
fn test_parent_ttl_ignored_after_creation() {
    let engine = setup_engine();

    engine.hset_with_ttl("p", "s1", "v1", Ttl::Seconds(10));
    engine.hset_with_ttl("p", "s2", "v2", Ttl::Seconds(999));

    let left = remaining(engine.hash_ttl("p"));
    assert!(left <= Duration::from_secs(10));
    assert_eq!(engine.hget("p", "s2"), Some(Value::from("v2")));
}

#[test]
fn test_hset_without_ttl_keeps_parent_expiry() {
    let engine = setup_engine();

    engine.hset_with_ttl("p", "s1", "v1", Ttl::Millis(50));
    engine.hset("p", "s2", "v2");

    thread::sleep(Duration::from_millis(100));

    assert_eq!(engine.hget("p", "s1"), None);
    assert_eq!(engine.hget("p", "s2"), None);
}

#[test]
fn test_expired_parent_drops_all_sub_keys() {
    let engine = setup_engine();

    engine.hset_with_ttl("p", "a", 1, Ttl::Millis(30));
    engine.hset("p", "b", 2);

    thread::sleep(Duration::from_millis(80));

    assert_eq!(engine.hget("p", "a"), None);
    assert_eq!(engine.hget_all("p"), None);
    assert!(engine.hash_keys("*").is_empty());
}

#[test]
fn test_hset_on_expired_parent_recreates_it() {
    let engine = setup_engine();

    engine.hset_with_ttl("p", "old", 1, Ttl::Millis(20));
    thread::sleep(Duration::from_millis(50));

    engine.hset_with_ttl("p", "new", 2, Ttl::Seconds(60));

    assert_eq!(engine.hget("p", "old"), None);
    assert_eq!(engine.hget("p", "new"), Some(Value::Int(2)));
    assert!(remaining(engine.hash_ttl("p")) > Duration::from_secs(58));
}

#[test]
fn test_hset_with_zero_ttl_is_unreadable() {
    let engine = setup_engine();

    engine.hset_with_ttl("p", "s", "v", Ttl::Seconds(0));

    assert_eq!(engine.hget("p", "s"), None);
}

#[test]
fn test_hset_expire_updates_parent() {
    let engine = setup_engine();

    engine.hset("p", "s", "v");
    assert_eq!(engine.hash_ttl("p"), Some(KeyTtl::Persistent));

    assert!(engine.hset_expire("p", Ttl::Millis(30)));
    thread::sleep(Duration::from_millis(80));

    assert_eq!(engine.hget("p", "s"), None);
}

#[test]
fn test_hset_expire_never_makes_parent_persistent() {
    let engine = setup_engine();

    engine.hset_with_ttl("p", "s", "v", Ttl::Millis(50));
    assert!(engine.hset_expire("p", Ttl::Never));

    thread::sleep(Duration::from_millis(100));

    assert_eq!(engine.hget("p", "s"), Some(Value::from("v")));
}

#[test]
fn test_hset_expire_missing_parent() {
    let engine = setup_engine();

    assert!(!engine.hset_expire("missing", Ttl::Seconds(10)));
}

// =============================================================================
// Removal Tests
// =============================================================================

#[test]
fn test_hdelete() {
    let engine = setup_engine();

    engine.hset("p", "a", 1);
    engine.hset("p", "b", 2);

    assert!(engine.hdelete("p", "a"));
    assert!(!engine.hdelete("p", "a"));
    assert!(!engine.hdelete("missing", "a"));

    assert_eq!(engine.hget("p", "a"), None);
    assert_eq!(engine.hget("p", "b"), Some(Value::Int(2)));
}

#[test]
fn test_hdelete_last_field_keeps_parent_expiry() {
    let engine = setup_engine();

    engine.hset_with_ttl("p", "a", 1, Ttl::Seconds(10));
    assert!(engine.hdelete("p", "a"));

    // A later hset does not get to set a new expiry
    engine.hset_with_ttl("p", "b", 2, Ttl::Seconds(999));
    assert!(remaining(engine.hash_ttl("p")) <= Duration::from_secs(10));
}

#[test]
fn test_hclear() {
    let engine = setup_engine();

    engine.hset("p", "a", 1);

    assert!(engine.hclear("p"));
    assert!(!engine.hclear("p"));
    assert_eq!(engine.hget("p", "a"), None);
    assert_eq!(engine.hlen("p"), 0);
}

#[test]
fn test_hash_keys_pattern() {
    let engine = setup_engine();

    engine.hset("session:1", "f", 1);
    engine.hset("session:2", "f", 1);
    engine.hset("cart:1", "f", 1);

    assert_eq!(engine.hash_keys("session:*"), vec!["session:1", "session:2"]);
}
