//! Command definitions
//!
//! Operations as data, for callers that drive the engine from parsed input
//! (the CLI does). `Engine::execute` runs a command and returns a `Reply`.

use std::fmt;

use crate::entry::{KeyTtl, Ttl};
use crate::value::Value;

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Get a value by key
    Get { key: String },

    /// Set a key-value pair
    Set { key: String, value: Value, ttl: Ttl },

    /// Delete a key
    Delete { key: String },

    /// Add `amount` to an integer key
    Incr { key: String, amount: i64 },

    /// Set a sub-key under a hash parent
    HSet {
        parent: String,
        field: String,
        value: Value,
        ttl: Ttl,
    },

    /// Get a sub-key's value
    HGet { parent: String, field: String },

    /// Replace a hash parent's expiry
    HExpire { parent: String, ttl: Ttl },

    /// Remove one sub-key
    HDelete { parent: String, field: String },

    /// Remove a hash parent and its sub-keys
    HClear { parent: String },

    /// List keys matching a glob pattern
    Keys { pattern: String },

    /// Remaining lifetime of a key
    Ttl { key: String },

    /// Remove everything
    Clear,

    /// Write the snapshot
    Dump,

    /// Replace state from the snapshot
    Load,
}

impl Command {
    /// Whether running this command can change the stored state
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Command::Get { .. }
                | Command::HGet { .. }
                | Command::Keys { .. }
                | Command::Ttl { .. }
                | Command::Dump
        )
    }
}

/// Result of an executed command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Success with nothing to return
    Ok,

    /// A looked-up value; `None` when absent
    Value(Option<Value>),

    /// A counter result
    Integer(i64),

    /// Whether something was found/removed/updated
    Bool(bool),

    /// Matching keys, sorted
    Keys(Vec<String>),

    /// Remaining lifetime; `None` when absent
    Ttl(Option<KeyTtl>),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "OK"),
            Reply::Value(Some(value)) => write!(f, "{}", value),
            Reply::Value(None) | Reply::Ttl(None) => write!(f, "(nil)"),
            Reply::Integer(i) => write!(f, "(integer) {}", i),
            Reply::Bool(b) => write!(f, "({})", b),
            Reply::Keys(keys) if keys.is_empty() => write!(f, "(empty)"),
            Reply::Keys(keys) => {
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, key)?;
                }
                Ok(())
            }
            Reply::Ttl(Some(ttl)) => write!(f, "(integer) {}", ttl.as_secs()),
        }
    }
}
