//! # stashkv
//!
//! An embeddable, in-process key-value store with:
//! - Optional per-key TTL, expired lazily on access (no background thread)
//! - Hash parents holding nested sub-keys, with expiry on the parent
//! - Atomic integer counters
//! - Glob-based key enumeration (`*`, `?`, `[a-z]`)
//! - Whole-state snapshots to `{dump_dir}/{name}.snap`
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Callers (threads)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                               │
//! │                 RwLock<Keyspace>                            │
//! │   ┌─────────────────────┐   ┌───────────────────────────┐   │
//! │   │ entries             │   │ hashes                    │   │
//! │   │ key → Entry<Value>  │   │ parent → Entry<Fields>    │   │
//! │   └─────────────────────┘   └───────────────────────────┘   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ dump / load
//!                       ▼
//!               ┌───────────────┐
//!               │   Snapshot    │
//!               │ (bincode+CRC) │
//!               └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use stashkv::{Config, Engine, Ttl, Value};
//!
//! let engine = Engine::new(Config::builder().name("cache").build());
//!
//! engine.set("user:1", "ada");
//! engine.set_with_ttl("session:1", "token", Ttl::Seconds(60));
//! assert_eq!(engine.get("user:1"), Some(Value::from("ada")));
//!
//! assert_eq!(engine.incr("hits").unwrap(), 1);
//!
//! engine.hset("profile:1", "lang", "en");
//! assert_eq!(engine.hget("profile:1", "lang"), Some(Value::from("en")));
//!
//! assert_eq!(engine.get_keys("user:*"), vec!["user:1".to_string()]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod entry;
pub mod pattern;
pub mod snapshot;
pub mod command;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::Config;
pub use value::Value;
pub use entry::{KeyTtl, Ttl};
pub use pattern::GlobPattern;
pub use command::{Command, Reply};
pub use engine::{Engine, Fields};
pub use snapshot::SnapshotData;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of stashkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
